// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a project's tests and collecting their results.

use crate::{
    command::CommandLine,
    config::EngineConfig,
    coverage::extract_coverage,
    errors::{CommandStep, EngineError},
    report::{RawTestEntry, parse_test_report},
    result::{ResultSet, assemble},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{fs, process::Output};
use tracing::{debug, info};

/// Something that can run a project's tests and produce a [`ResultSet`].
pub trait TestEngine {
    /// Runs the tests for the project rooted at `project_root`.
    fn run(&self, project_root: &Utf8Path) -> Result<ResultSet, EngineError>;
}

/// Runs GoogleTest suites through a project's build and coverage scripts.
///
/// A run:
///
/// 1. runs the build command and waits for it;
/// 2. runs the coverage command, which runs the tests and generates the XML report and
///    `*.gcov.html` documents, and waits for it;
/// 3. reads the report and the coverage documents in parallel, and joins them.
///
/// Any failure aborts the run before a result set is produced.
#[derive(Clone, Debug, Default)]
pub struct GTestEngine {
    config_file: Option<Utf8PathBuf>,
}

impl GTestEngine {
    /// Creates an engine that reads `.config/gtest-engine.toml` from each project root.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads configuration from `config_file` instead of the project's config.
    pub fn with_config_file(mut self, config_file: impl Into<Utf8PathBuf>) -> Self {
        self.config_file = Some(config_file.into());
        self
    }

    /// Runs the build and coverage commands from `config`, then ingests their output.
    pub fn run_with_config(&self, config: &EngineConfig) -> Result<ResultSet, EngineError> {
        if let Some(command) = config.build_command() {
            info!("building with `{command}`");
            let output = run_step(CommandStep::Build, command, config.project_root())?;
            if !output.status.success() {
                return Err(EngineError::BuildCommandFailed {
                    command: command.to_string(),
                    status: output.status.to_string(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }
        } else {
            debug!("no build command configured, skipping build");
        }

        if let Some(command) = config.coverage_command() {
            info!("running tests and generating coverage with `{command}`");
            let output = run_step(CommandStep::Coverage, command, config.project_root())?;
            if !output.status.success() {
                return Err(EngineError::CoverageCommandFailed {
                    command: command.to_string(),
                    status: output.status.to_string(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                });
            }
        } else {
            debug!("no coverage command configured, skipping coverage generation");
        }

        ingest(config.report_path(), config.coverage_dir())
    }
}

impl TestEngine for GTestEngine {
    fn run(&self, project_root: &Utf8Path) -> Result<ResultSet, EngineError> {
        let config = EngineConfig::from_sources(project_root, self.config_file.as_deref())?;
        self.run_with_config(&config)
    }
}

/// Reads an existing report and coverage directory into a [`ResultSet`], without running any
/// commands.
///
/// The report and the coverage documents are read in parallel. If both fail, the report error is
/// returned.
pub fn ingest(report_path: &Utf8Path, coverage_dir: &Utf8Path) -> Result<ResultSet, EngineError> {
    let (entries, coverage) = rayon::join(
        || read_report(report_path),
        || extract_coverage(coverage_dir),
    );
    let entries = entries?;
    let coverage = coverage?;
    debug!(
        "joining {} testcase(s) with coverage for {} file(s)",
        entries.len(),
        coverage.len()
    );
    Ok(assemble(entries, coverage))
}

fn read_report(path: &Utf8Path) -> Result<Vec<RawTestEntry>, EngineError> {
    let document = fs::read(path).map_err(|error| EngineError::ReadReport {
        path: path.to_owned(),
        error,
    })?;
    parse_test_report(&document).map_err(|error| EngineError::ParseReport {
        path: path.to_owned(),
        error,
    })
}

fn run_step(
    step: CommandStep,
    command: &CommandLine,
    project_root: &Utf8Path,
) -> Result<Output, EngineError> {
    command
        .run_captured(project_root)
        .map_err(|error| EngineError::CommandExec {
            step,
            command: command.to_string(),
            error,
        })
}
