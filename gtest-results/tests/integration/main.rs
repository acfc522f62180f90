// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for [`GTestEngine`].
//!
//! These run the build and coverage steps as `sh` scripts, so they're only built on Unix.

#![cfg(unix)]

use gtest_results::{
    GTestEngine, TestEngine,
    config::EngineConfig,
    errors::{CommandStep, ConfigParseErrorKind, EngineError, ReportParseError},
    report::TestStatus,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

mod temp_project;

use temp_project::TempProject;

const SCENARIO_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites tests="2" failures="1" name="AllTests">
  <testsuite name="Suite" tests="2" failures="1">
    <testcase name="A" status="run" time="0.01" classname="Suite" />
    <testcase name="B" status="run" time="0.02" classname="Suite">
      <failure message="Value of: 1 == 2" type=""><![CDATA[foo.cc:12
Expected equality]]></failure>
    </testcase>
  </testsuite>
</testsuites>
"#;

const LIB_COVERAGE: &str = r#"<html><body><table><tr><td><pre class="sourceHeading">Source code</pre>
<pre class="source">
<span class="lineNum">       1 </span><span class="lineCov">          1 : int add(int a, int b) {</span>
<span class="lineNum">       2 </span><span class="lineNoCov">          0 :   return a - b;</span>
<span class="lineNum">       3 </span>            : }
</pre></td></tr></table></body></html>
"#;

const MAIN_COVERAGE: &str = r#"<pre class="source">
<span class="lineNum">       1 </span>            : #include "lib.h"
<span class="lineNum">       2 </span><span class="lineCov">          1 : int main() { return 0; }</span>
</pre>
"#;

fn stage_scenario(project: &TempProject) {
    project.stage("test_detail.xml", SCENARIO_REPORT);
    project.stage("coverage/html/src/lib.cc.gcov.html", LIB_COVERAGE);
    project.stage("coverage/html/src/main.cc.gcov.html", MAIN_COVERAGE);
    project.stage("coverage/html/index.html", "<html></html>");
}

#[test]
fn run_builds_then_collects_results() {
    let project = TempProject::new();
    stage_scenario(&project);

    let results = GTestEngine::new()
        .run(project.root())
        .expect("engine run succeeds");

    assert!(
        project.root().join("built").exists(),
        "build script was not run"
    );

    let outcomes: Vec<_> = results
        .outcomes()
        .iter()
        .map(|outcome| (outcome.display_name(), outcome.duration(), outcome.status()))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("Suite.A".to_owned(), 0.01, TestStatus::Pass),
            ("Suite.B".to_owned(), 0.02, TestStatus::Fail),
        ]
    );
    assert_eq!(
        results.outcomes()[1].details(),
        Some("Value of: 1 == 2"),
        "failure message is captured"
    );

    let coverage: Vec<_> = results
        .coverage()
        .iter()
        .map(|(path, lines)| (path.to_owned(), lines.to_string()))
        .collect();
    assert_eq!(
        coverage,
        vec![
            ("src/lib.cc".to_owned(), "CUN".to_owned()),
            ("src/main.cc".to_owned(), "NC".to_owned()),
        ]
    );
    for outcome in &results {
        assert!(Arc::ptr_eq(outcome.coverage(), results.coverage()));
    }

    let summary = results.summary();
    assert_eq!((summary.passed, summary.failed), (1, 1));
    assert!(summary.has_failures());
}

#[test]
fn coverage_failure_surfaces_stdout() {
    let project = TempProject::new();
    project.write(
        "coverage.sh",
        "echo 'lcov: no .gcda files found'\necho 'details on stderr' >&2\nexit 2\n",
    );

    let error = GTestEngine::new()
        .run(project.root())
        .expect_err("coverage failure is fatal");
    match error {
        EngineError::CoverageCommandFailed {
            command, stdout, ..
        } => {
            assert_eq!(command, "sh coverage.sh");
            assert_eq!(stdout, "lcov: no .gcda files found\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn build_failure_stops_the_run() {
    let project = TempProject::new();
    project.write("build.sh", "echo 'error: missing header' >&2\nexit 1\n");
    stage_scenario(&project);

    let error = GTestEngine::new()
        .run(project.root())
        .expect_err("build failure is fatal");
    match error {
        EngineError::BuildCommandFailed { stderr, .. } => {
            assert_eq!(stderr, "error: missing header\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(
        !project.root().join("test_detail.xml").exists(),
        "coverage script ran after a failed build"
    );
}

#[test]
fn missing_build_program() {
    let project = TempProject::new();
    project.write(
        ".config/gtest-engine.toml",
        "build-command = \"gtest-engine-no-such-program-Y7uDG1HrrY\"\n",
    );

    let error = GTestEngine::new()
        .run(project.root())
        .expect_err("unspawnable build is fatal");
    assert!(
        matches!(
            error,
            EngineError::CommandExec {
                step: CommandStep::Build,
                ..
            }
        ),
        "unexpected error: {error:?}"
    );
}

#[test]
fn malformed_report_fails_the_run() {
    let project = TempProject::new();
    stage_scenario(&project);
    project.stage(
        "test_detail.xml",
        "<testsuites><testsuite name=\"Suite\"><testcase name=\"A\" status=\"run\">",
    );

    let error = GTestEngine::new()
        .run(project.root())
        .expect_err("malformed report is fatal");
    assert!(
        matches!(
            error,
            EngineError::ParseReport {
                error: ReportParseError::Malformed { .. },
                ..
            }
        ),
        "unexpected error: {error:?}"
    );
}

#[test]
fn empty_commands_ingest_existing_artifacts() {
    let project = TempProject::empty();
    project.write(
        ".config/gtest-engine.toml",
        "build-command = \"\"\ncoverage-command = \"\"\nreport-path = \"out/report.xml\"\n",
    );
    project.write(
        "out/report.xml",
        r#"<testsuites><testsuite name="S"><testcase name="Later" status="notrun" /><testcase name="Odd" /></testsuite></testsuites>"#,
    );
    project.write("coverage/html/lib.cc.gcov.html", LIB_COVERAGE);

    let config = EngineConfig::from_sources(project.root(), None).expect("config parses");
    assert_eq!(config.build_command(), None);
    assert_eq!(config.coverage_command(), None);

    let results = GTestEngine::new()
        .run_with_config(&config)
        .expect("ingest succeeds");
    let statuses: Vec<_> = results
        .outcomes()
        .iter()
        .map(|outcome| (outcome.name(), outcome.status()))
        .collect();
    assert_eq!(
        statuses,
        vec![("Later", TestStatus::Skip), ("Odd", TestStatus::Unsound)]
    );
    assert_eq!(
        results
            .coverage()
            .get("lib.cc")
            .map(ToString::to_string)
            .as_deref(),
        Some("CUN")
    );
}

#[test]
fn explicit_config_file() {
    let project = TempProject::new();
    stage_scenario(&project);
    project.write(
        "ci.toml",
        "build-command = \"\"\ncoverage-command = \"sh coverage.sh\"\n",
    );

    // Without the build step, the coverage script's guard trips.
    let error = GTestEngine::new()
        .with_config_file(project.root().join("ci.toml"))
        .run(project.root())
        .expect_err("coverage script refuses to run");
    match error {
        EngineError::CoverageCommandFailed { stdout, .. } => {
            assert_eq!(stdout, "coverage ran before build\n");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn invalid_config_is_reported() {
    let project = TempProject::new();
    project.write(".config/gtest-engine.toml", "build-command = 'sh \"oops'\n");

    let error = GTestEngine::new()
        .run(project.root())
        .expect_err("invalid config is fatal");
    match error {
        EngineError::Config(error) => {
            assert!(
                matches!(
                    error.kind(),
                    ConfigParseErrorKind::InvalidCommand {
                        key: "build-command",
                        ..
                    }
                ),
                "unexpected error kind: {:?}",
                error.kind()
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
