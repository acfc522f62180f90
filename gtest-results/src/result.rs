// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The unified result set handed to reporters.

use crate::{
    coverage::CoverageIndex,
    report::{RawTestEntry, TestStatus},
};
use serde::Serialize;
use std::sync::Arc;

/// The outcome of a single test, together with the run's coverage.
///
/// Coverage is collected for the whole run rather than per test, so every outcome in a
/// [`ResultSet`] points at the same [`CoverageIndex`].
#[derive(Clone, Debug, Serialize)]
pub struct TestOutcome {
    name: String,
    classname: Option<String>,
    duration: f64,
    status: TestStatus,
    details: Option<String>,
    coverage: Arc<CoverageIndex>,
}

impl TestOutcome {
    fn new(entry: RawTestEntry, coverage: Arc<CoverageIndex>) -> Self {
        let RawTestEntry {
            name,
            classname,
            duration,
            status,
            details,
        } = entry;
        Self {
            name,
            classname,
            duration,
            status,
            details,
            coverage,
        }
    }

    /// The test's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The test's class name (the GoogleTest suite), if reported.
    pub fn classname(&self) -> Option<&str> {
        self.classname.as_deref()
    }

    /// The name to show users: `classname.name` if a class name is known, `name` otherwise.
    pub fn display_name(&self) -> String {
        match &self.classname {
            Some(classname) => format!("{classname}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Time taken, in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// The test's status.
    pub fn status(&self) -> TestStatus {
        self.status
    }

    /// Failure messages reported for this test, if any.
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// The run's coverage.
    pub fn coverage(&self) -> &Arc<CoverageIndex> {
        &self.coverage
    }
}

/// All outcomes from a run, in report order.
#[derive(Clone, Debug, Serialize)]
pub struct ResultSet {
    outcomes: Vec<TestOutcome>,
    #[serde(skip)]
    coverage: Arc<CoverageIndex>,
}

impl ResultSet {
    /// Returns the outcomes, in the order their testcases appear in the report.
    pub fn outcomes(&self) -> &[TestOutcome] {
        &self.outcomes
    }

    /// Returns the coverage shared by every outcome.
    pub fn coverage(&self) -> &Arc<CoverageIndex> {
        &self.coverage
    }

    /// Returns the number of outcomes.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if the report had no testcases.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Counts outcomes by status.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for outcome in &self.outcomes {
            match outcome.status {
                TestStatus::Pass => summary.passed += 1,
                TestStatus::Fail => summary.failed += 1,
                TestStatus::Skip => summary.skipped += 1,
                TestStatus::Unsound => summary.unsound += 1,
            }
        }
        summary
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a TestOutcome;
    type IntoIter = std::slice::Iter<'a, TestOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.iter()
    }
}

/// Counts of outcomes by status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Tests that passed.
    pub passed: usize,

    /// Tests that failed.
    pub failed: usize,

    /// Tests that were not run.
    pub skipped: usize,

    /// Tests whose status could not be interpreted.
    pub unsound: usize,
}

impl RunSummary {
    /// Returns the total number of outcomes.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.unsound
    }

    /// Returns true if any test failed or had an uninterpretable status.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.unsound > 0
    }
}

/// Joins report entries with the run's coverage.
///
/// One outcome is produced per entry, in the same order.
pub fn assemble(entries: Vec<RawTestEntry>, coverage: CoverageIndex) -> ResultSet {
    assemble_shared(entries, Arc::new(coverage))
}

/// Like [`assemble`], for coverage that is already shared.
pub fn assemble_shared(entries: Vec<RawTestEntry>, coverage: Arc<CoverageIndex>) -> ResultSet {
    let outcomes = entries
        .into_iter()
        .map(|entry| TestOutcome::new(entry, coverage.clone()))
        .collect();
    ResultSet { outcomes, coverage }
}
