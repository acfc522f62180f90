// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while ingesting test reports and coverage.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{fmt, io, path::PathBuf};
use thiserror::Error;

/// An error that occurred while parsing the engine config.
#[derive(Debug, Error)]
#[error("failed to parse gtest-engine config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error that occurred.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config from its sources.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<ConfigError>),

    /// A command string could not be split into arguments.
    #[error("invalid `{key}`: {message}")]
    InvalidCommand {
        /// The config key holding the command.
        key: &'static str,

        /// The error produced while splitting the command.
        message: String,
    },
}

/// An error that occurred while parsing a GoogleTest XML report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportParseError {
    /// The report is not a well-formed XML document.
    #[error("test report is not well-formed (at byte {position}): {reason}")]
    Malformed {
        /// The byte offset at which the problem was detected.
        position: usize,

        /// A description of the problem.
        reason: MalformedReason,
    },

    /// A `testcase` element is missing a required attribute.
    #[error("testcase #{index} in test report is missing the required `{field}` attribute")]
    MissingField {
        /// The attribute that was missing.
        field: &'static str,

        /// The 1-based position of the testcase within the report.
        index: usize,
    },
}

/// The reason a report was rejected as malformed.
#[derive(Debug)]
#[non_exhaustive]
pub enum MalformedReason {
    /// The XML reader rejected the input.
    Syntax(quick_xml::Error),

    /// The end of the document was reached with elements still open.
    UnclosedElements {
        /// The names of the open elements, outermost first.
        open: Vec<String>,
    },

    /// The document has no root element.
    NoRootElement,

    /// A second root element was found after the first one closed.
    MultipleRootElements {
        /// The name of the extra element.
        name: String,
    },

    /// An end tag was found that doesn't close the innermost open element.
    UnmatchedEndTag {
        /// The name in the end tag.
        name: String,
    },

    /// Non-whitespace text was found outside the root element.
    TextOutsideRoot,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(error) => write!(f, "{error}"),
            Self::UnclosedElements { open } => {
                write!(f, "unclosed element(s) at end of input: {}", open.join(" > "))
            }
            Self::NoRootElement => write!(f, "no root element"),
            Self::MultipleRootElements { name } => {
                write!(f, "found a second root element `{name}`")
            }
            Self::UnmatchedEndTag { name } => write!(f, "unmatched end tag `</{name}>`"),
            Self::TextOutsideRoot => write!(f, "text found outside the root element"),
        }
    }
}

/// An error that occurred while extracting coverage from a directory tree.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoverageError {
    /// The coverage root exists but could not be accessed.
    #[error("coverage directory `{root}` could not be accessed")]
    RootInaccessible {
        /// The coverage root that was searched.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The coverage root exists but is not a directory.
    #[error("coverage path `{root}` is not a directory")]
    RootNotADirectory {
        /// The coverage root that was searched.
        root: Utf8PathBuf,
    },

    /// An error occurred while walking the coverage root.
    #[error("error walking coverage directory `{root}`")]
    Walk {
        /// The coverage root being walked.
        root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: walkdir::Error,
    },

    /// A discovered path is not valid UTF-8.
    #[error("coverage document path `{}` is not valid UTF-8", path.display())]
    NonUtf8Path {
        /// The offending path.
        path: PathBuf,
    },

    /// A coverage document could not be read.
    #[error("failed to read coverage document `{path}`")]
    ReadDocument {
        /// The document that could not be read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Two coverage documents map to the same source path.
    #[error(
        "coverage documents `{first}` and `{second}` both map to source path `{source_path}`"
    )]
    DuplicateMapping {
        /// The source path both documents resolve to.
        source_path: String,

        /// The document that was indexed first.
        first: Utf8PathBuf,

        /// The document that collided with it.
        second: Utf8PathBuf,
    },
}

/// An error that occurred while running the engine end to end.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The project's configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigParseError),

    /// An external command could not be started.
    #[error("failed to execute {step} command `{command}`")]
    CommandExec {
        /// The step the command belongs to.
        step: CommandStep,

        /// The command line.
        command: String,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The build command exited unsuccessfully.
    #[error("build command `{command}` failed with {status}")]
    BuildCommandFailed {
        /// The command line.
        command: String,

        /// The exit status, as displayed by the platform.
        status: String,

        /// Captured standard output.
        stdout: String,

        /// Captured standard error.
        stderr: String,
    },

    /// The coverage command exited unsuccessfully.
    ///
    /// The captured standard output is surfaced verbatim.
    #[error("coverage command `{command}` failed with {status}")]
    CoverageCommandFailed {
        /// The command line.
        command: String,

        /// The exit status, as displayed by the platform.
        status: String,

        /// Captured standard output.
        stdout: String,
    },

    /// The test report could not be read.
    #[error("failed to read test report `{path}`")]
    ReadReport {
        /// The report path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The test report could not be parsed.
    #[error("failed to parse test report `{path}`")]
    ParseReport {
        /// The report path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: ReportParseError,
    },

    /// Coverage could not be extracted.
    #[error("failed to extract coverage")]
    Coverage(#[from] CoverageError),
}

/// Identifies which external step a command belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandStep {
    /// The build step.
    Build,

    /// The coverage-generation step.
    Coverage,
}

impl fmt::Display for CommandStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Coverage => write!(f, "coverage"),
        }
    }
}
