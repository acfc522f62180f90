// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use camino_tempfile_ext::prelude::*;
use indoc::indoc;

/// A GoogleTest project in a temporary directory, with shell scripts standing in for the real
/// build and coverage tooling.
///
/// The coverage script copies everything under `staged/` into the project root, so tests stage
/// the report and coverage documents they want the run to produce.
#[derive(Debug)]
pub struct TempProject {
    temp_dir: Utf8TempDir,
}

impl TempProject {
    /// Creates a project whose build script leaves a `built` marker behind, and whose coverage
    /// script refuses to run before the build.
    pub fn new() -> Self {
        let project = Self::empty();
        project.write(
            ".config/gtest-engine.toml",
            indoc! {r#"
                build-command = "sh build.sh"
                coverage-command = "sh coverage.sh"
            "#},
        );
        project.write(
            "build.sh",
            indoc! {r#"
                echo building
                touch built
            "#},
        );
        project.write(
            "coverage.sh",
            indoc! {r#"
                test -f built || { echo "coverage ran before build"; exit 7; }
                cp -R staged/. ./
            "#},
        );
        project
    }

    /// Creates a project with no files at all.
    pub fn empty() -> Self {
        let temp_dir = camino_tempfile::Builder::new()
            .prefix("gtest-engine-project-")
            .tempdir()
            .expect("created temp dir");
        Self { temp_dir }
    }

    pub fn root(&self) -> &Utf8Path {
        self.temp_dir.path()
    }

    pub fn write(&self, path: &str, contents: &str) {
        self.temp_dir
            .child(path)
            .write_str(contents)
            .unwrap_or_else(|error| panic!("failed to write {path}: {error}"));
    }

    /// Stages a file for the coverage script to copy into place.
    pub fn stage(&self, path: &str, contents: &str) {
        self.write(&format!("staged/{path}"), contents);
    }
}
