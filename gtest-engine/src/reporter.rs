// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Printing result sets to stdout.

use clap::ValueEnum;
use gtest_results::{
    ResultSet,
    coverage::{CoverageLineString, LineCoverage},
    report::TestStatus,
};
use owo_colors::{OwoColorize, Style, style};
use std::io::{self, Write};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum MessageFormat {
    /// One line per test, followed by a summary
    #[default]
    Human,
    /// The full result set, including coverage, as JSON
    Json,
}

pub(crate) struct ResultReporter {
    format: MessageFormat,
    styles: ReporterStyles,
    show_coverage: bool,
}

impl ResultReporter {
    pub(crate) fn new(format: MessageFormat) -> Self {
        Self {
            format,
            styles: ReporterStyles::default(),
            show_coverage: false,
        }
    }

    pub(crate) fn colorize(&mut self) {
        self.styles.colorize();
    }

    /// Lists per-file coverage after the outcomes in human output.
    pub(crate) fn set_show_coverage(&mut self, show_coverage: bool) {
        self.show_coverage = show_coverage;
    }

    pub(crate) fn write_results(&self, results: &ResultSet, mut writer: impl Write) -> io::Result<()> {
        match self.format {
            MessageFormat::Human => self.write_human(results, &mut writer)?,
            MessageFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, results)?;
                writeln!(writer)?;
            }
        }
        writer.flush()
    }

    fn write_human(&self, results: &ResultSet, writer: &mut dyn Write) -> io::Result<()> {
        for outcome in results {
            let status = format!("{:>7}", outcome.status());
            writeln!(
                writer,
                "{} {:>9.3}s  {}",
                status.style(self.styles.status(outcome.status())),
                outcome.duration(),
                outcome.display_name().style(self.styles.name),
            )?;
            if outcome.status().is_failure()
                && let Some(details) = outcome.details()
            {
                for line in details.lines() {
                    writeln!(writer, "{:>20}{line}", "")?;
                }
            }
        }

        if self.show_coverage {
            for (path, lines) in results.coverage().iter() {
                let (covered, instrumented) = coverage_counts(lines);
                writeln!(
                    writer,
                    "{} {:>5}/{:<5} {path}",
                    format!("{:>7}", "COV").style(self.styles.count),
                    covered,
                    instrumented,
                )?;
            }
        }

        let summary = results.summary();
        writeln!(writer, "{}", "------------".style(self.styles.count))?;
        writeln!(
            writer,
            "{:>7} {} {} run: {} passed, {} failed, {} skipped, {} unsound; coverage for {} {}",
            "Summary".style(self.styles.summary),
            summary.total().style(self.styles.count),
            plural_tests(summary.total()),
            summary.passed.style(self.styles.pass),
            summary.failed.style(self.styles.fail),
            summary.skipped.style(self.styles.skip),
            summary.unsound.style(self.styles.unsound),
            results.coverage().len().style(self.styles.count),
            if results.coverage().len() == 1 {
                "file"
            } else {
                "files"
            },
        )
    }
}

/// Returns (covered, instrumented) line counts. Lines that can't be classified aren't instrumented.
fn coverage_counts(lines: &CoverageLineString) -> (usize, usize) {
    let covered = lines.count(LineCoverage::Covered);
    (covered, covered + lines.count(LineCoverage::Uncovered))
}

fn plural_tests(count: usize) -> &'static str {
    if count == 1 { "test" } else { "tests" }
}

#[derive(Debug, Default)]
struct ReporterStyles {
    pass: Style,
    fail: Style,
    skip: Style,
    unsound: Style,
    name: Style,
    count: Style,
    summary: Style,
}

impl ReporterStyles {
    fn colorize(&mut self) {
        self.pass = style().green().bold();
        self.fail = style().red().bold();
        self.skip = style().yellow().bold();
        self.unsound = style().magenta().bold();
        self.name = style().bold();
        self.count = style().bold();
        self.summary = style().cyan().bold();
    }

    fn status(&self, status: TestStatus) -> Style {
        match status {
            TestStatus::Pass => self.pass,
            TestStatus::Fail => self.fail,
            TestStatus::Skip => self.skip,
            TestStatus::Unsound => self.unsound,
        }
    }
}
