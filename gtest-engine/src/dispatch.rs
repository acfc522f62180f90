// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result},
    output::{OutputContext, OutputOpts},
    reporter::{MessageFormat, ResultReporter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use gtest_results::{EngineExitCode, GTestEngine, ResultSet, config::EngineConfig, engine};
use std::io::Write;
use tracing::{debug, info};

/// Builds a GoogleTest project, runs its tests under coverage, and reports the results.
///
/// Test outcomes are read from the GoogleTest XML report, and line coverage from the genhtml
/// `*.gcov.html` documents, that the project's scripts produce.
#[derive(Debug, Parser)]
#[command(version, name = "gtest-engine")]
pub struct GTestEngineApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl GTestEngineApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, writing results to `writer`.
    ///
    /// Returns the process exit code on success.
    pub fn exec(self, output: OutputContext, writer: &mut dyn Write) -> Result<i32> {
        match self.command {
            Command::Run { project_opts } => {
                let (config, reporter) = project_opts.setup(output)?;
                let results = GTestEngine::new()
                    .run_with_config(&config)
                    .map_err(ExpectedError::engine_error)?;
                finish(&results, &reporter, writer)
            }
            Command::Ingest { project_opts } => {
                let (config, reporter) = project_opts.setup(output)?;
                info!(
                    "reading existing results from `{}` and `{}`",
                    config.report_path(),
                    config.coverage_dir()
                );
                let results = engine::ingest(config.report_path(), config.coverage_dir())
                    .map_err(ExpectedError::engine_error)?;
                finish(&results, &reporter, writer)
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the project, run its tests under coverage, and report the results
    ///
    /// Runs the configured build command, then the coverage command, and waits for each to
    /// finish. The coverage command is expected to run the tests, leaving behind an XML report
    /// and a directory of `*.gcov.html` documents.
    Run {
        #[command(flatten)]
        project_opts: ProjectOpts,
    },

    /// Report results left behind by an earlier run, without running any commands
    Ingest {
        #[command(flatten)]
        project_opts: ProjectOpts,
    },
}

#[derive(Debug, Args)]
struct ProjectOpts {
    /// Project root [default: current directory]
    #[arg(long, value_name = "DIR")]
    project_root: Option<Utf8PathBuf>,

    /// Config file [default: project-root/.config/gtest-engine.toml]
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Output format
    #[arg(
        short = 'T',
        long,
        value_enum,
        default_value_t,
        help_heading = "Output options",
        value_name = "FMT"
    )]
    message_format: MessageFormat,
}

impl ProjectOpts {
    fn setup(self, output: OutputContext) -> Result<(EngineConfig, ResultReporter)> {
        let project_root = match self.project_root {
            Some(project_root) => project_root,
            None => current_dir()?,
        };
        debug!("using project root `{project_root}`");
        let config = make_config(&project_root, self.config_file.as_deref())?;

        let mut reporter = ResultReporter::new(self.message_format);
        if output.color.should_colorize(supports_color::Stream::Stdout) {
            reporter.colorize();
        }
        reporter.set_show_coverage(output.verbose);

        Ok((config, reporter))
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDirFailed { err })?;
    Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDirInvalidUtf8 { err })
}

fn make_config(project_root: &Utf8Path, config_file: Option<&Utf8Path>) -> Result<EngineConfig> {
    Ok(EngineConfig::from_sources(project_root, config_file)?)
}

fn finish(results: &ResultSet, reporter: &ResultReporter, writer: &mut dyn Write) -> Result<i32> {
    reporter
        .write_results(results, writer)
        .map_err(|err| ExpectedError::WriteOutputFailed { err })?;

    if results.summary().has_failures() {
        Err(ExpectedError::TestRunFailed)
    } else {
        Ok(EngineExitCode::OK)
    }
}
