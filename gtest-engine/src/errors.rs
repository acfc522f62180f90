// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::FromPathBufError;
use gtest_results::{
    EngineExitCode,
    errors::{CommandStep, ConfigParseError, EngineError},
};
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that gtest-engine knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 {
        #[source]
        err: FromPathBufError,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("engine run failed")]
    EngineFailed {
        #[source]
        err: EngineError,
    },
    #[error("error writing results")]
    WriteOutputFailed {
        #[source]
        err: std::io::Error,
    },
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    pub(crate) fn engine_error(err: EngineError) -> Self {
        match err {
            EngineError::Config(err) => Self::ConfigParseError { err },
            err => Self::EngineFailed { err },
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigParseError { .. } => EngineExitCode::SETUP_ERROR,
            Self::EngineFailed { err } => match err {
                EngineError::Config(_) => EngineExitCode::SETUP_ERROR,
                EngineError::CommandExec {
                    step: CommandStep::Build,
                    ..
                }
                | EngineError::BuildCommandFailed { .. } => EngineExitCode::BUILD_FAILED,
                EngineError::CommandExec {
                    step: CommandStep::Coverage,
                    ..
                }
                | EngineError::CoverageCommandFailed { .. } => EngineExitCode::COVERAGE_FAILED,
                EngineError::ReadReport { .. } | EngineError::ParseReport { .. } => {
                    EngineExitCode::REPORT_PARSE_FAILED
                }
                EngineError::Coverage(_) => EngineExitCode::COVERAGE_EXTRACT_FAILED,
                _ => 1,
            },
            Self::WriteOutputFailed { .. } => EngineExitCode::WRITE_OUTPUT_ERROR,
            Self::TestRunFailed => EngineExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::CurrentDirFailed { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { err } => {
                error!(
                    "current directory `{}` is not valid UTF-8 (hint: pass in --project-root)",
                    err.as_path().display().style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                err.source()
            }
            Self::EngineFailed { err } => display_engine_error(err, styles),
            Self::WriteOutputFailed { err } => {
                error!("error writing results");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

fn display_engine_error<'a>(err: &'a EngineError, styles: &StderrStyles) -> Option<&'a dyn Error> {
    match err {
        EngineError::CommandExec {
            step,
            command,
            error,
        } => {
            error!(
                "failed to execute {step} command `{}`",
                command.style(styles.bold)
            );
            Some(error as &dyn Error)
        }
        EngineError::BuildCommandFailed {
            command,
            status,
            stdout,
            stderr,
        } => {
            error!(
                "build command `{}` failed with {status}",
                command.style(styles.bold)
            );
            display_captured("stdout", stdout, styles);
            display_captured("stderr", stderr, styles);
            None
        }
        EngineError::CoverageCommandFailed {
            command,
            status,
            stdout,
        } => {
            error!(
                "coverage command `{}` failed with {status}",
                command.style(styles.bold)
            );
            display_captured("stdout", stdout, styles);
            None
        }
        EngineError::ReadReport { path, error } => {
            error!("failed to read test report `{}`", path.style(styles.bold));
            Some(error as &dyn Error)
        }
        EngineError::ParseReport { path, error } => {
            error!("failed to parse test report `{}`", path.style(styles.bold));
            Some(error as &dyn Error)
        }
        other => {
            error!("{other}");
            other.source()
        }
    }
}

/// Prints a command's captured output exactly as the command wrote it.
fn display_captured(name: &str, output: &str, styles: &StderrStyles) {
    if output.is_empty() {
        return;
    }
    error!(
        target: NO_HEADING_TARGET,
        "{}\n{}",
        format!("--- {name} ---").style(styles.captured_header),
        output.strip_suffix('\n').unwrap_or(output),
    );
}
