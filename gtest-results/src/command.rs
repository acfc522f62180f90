// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External build and coverage commands.

use camino::Utf8Path;
use std::{fmt, io, process::Output};
use tracing::{debug, trace};

/// An external command, split into a program and its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    /// Splits `command` using shell quoting rules.
    ///
    /// Returns `Ok(None)` if the command is empty or all whitespace.
    pub fn parse(command: &str) -> Result<Option<Self>, shell_words::ParseError> {
        let mut words = shell_words::split(command)?.into_iter();
        Ok(words.next().map(|program| Self {
            program,
            args: words.collect(),
        }))
    }

    /// Returns the program to execute.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Convert the command to a [`duct::Expression`] run in `dir`.
    pub fn to_expression(&self, dir: &Utf8Path) -> duct::Expression {
        duct::cmd(self.program.as_str(), self.args.iter().map(|arg| &**arg))
            .dir(dir.as_std_path())
    }

    /// Runs the command in `dir` to completion, capturing standard output and standard error.
    ///
    /// A non-zero exit is not an error here: callers inspect [`Output::status`].
    pub(crate) fn run_captured(&self, dir: &Utf8Path) -> io::Result<Output> {
        let expression = self.to_expression(dir);
        trace!("executing command: {:?}", expression);
        let output = expression
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()?;
        debug!("`{self}` exited with {}", output.status);
        Ok(output)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(&self.program).chain(&self.args);
        write!(f, "{}", shell_words::join(words))
    }
}
