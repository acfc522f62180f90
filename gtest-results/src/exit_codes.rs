// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `gtest-engine` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum EngineExitCode {}

impl EngineExitCode {
    /// No errors occurred and every test passed or was skipped.
    pub const OK: i32 = 0;

    /// One or more tests failed, or had a status that could not be interpreted.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The build command failed to start or exited unsuccessfully.
    pub const BUILD_FAILED: i32 = 101;

    /// The coverage command failed to start or exited unsuccessfully.
    pub const COVERAGE_FAILED: i32 = 102;

    /// Coverage documents could not be read or indexed.
    pub const COVERAGE_EXTRACT_FAILED: i32 = 103;

    /// The test report could not be read or parsed.
    pub const REPORT_PARSE_FAILED: i32 = 104;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// A user issue happened while setting up a gtest-engine invocation.
    pub const SETUP_ERROR: i32 = 96;
}
