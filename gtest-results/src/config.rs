// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for gtest-engine.
//!
//! The built-in [`EngineConfig::DEFAULT_CONFIG`] is layered under the project's
//! `.config/gtest-engine.toml`, if present.

use crate::{
    command::CommandLine,
    errors::{ConfigParseError, ConfigParseErrorKind},
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// Resolved configuration for a project.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    project_root: Utf8PathBuf,
    build_command: Option<CommandLine>,
    coverage_command: Option<CommandLine>,
    report_path: Utf8PathBuf,
    coverage_dir: Utf8PathBuf,
}

impl EngineConfig {
    /// The default location of the config within the project root.
    pub const CONFIG_PATH: &'static str = ".config/gtest-engine.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Project-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config from the given file, or if not specified from `.config/gtest-engine.toml`
    /// in the project root.
    ///
    /// Unknown keys are reported as warnings.
    pub fn from_sources(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        Self::from_sources_with_warnings(project_root, config_file, |config_file, unknown| {
            warn!(
                "ignoring unknown configuration keys in config file {config_file}: {}",
                unknown.iter().cloned().collect::<Vec<_>>().join(", ")
            );
        })
    }

    /// Like [`Self::from_sources`], calling `unknown_callback` with any unknown keys instead of
    /// logging them.
    pub fn from_sources_with_warnings(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
        mut unknown_callback: impl FnMut(&Utf8Path, &BTreeSet<String>),
    ) -> Result<Self, ConfigParseError> {
        let project_root = project_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        if !unknown.is_empty() {
            unknown_callback(&config_file, &unknown);
        }

        deserialized
            .into_config(project_root)
            .map_err(|kind| ConfigParseError::new(config_file, kind))
    }

    /// Returns the default config for the given project root.
    #[cfg(test)]
    pub(crate) fn default_config(project_root: impl Into<Utf8PathBuf>) -> Self {
        let (deserialized, unknown) =
            Self::build_and_deserialize_config(&Self::make_default_config())
                .expect("default config is always valid");
        assert!(
            unknown.is_empty(),
            "found unknown keys in default config: {unknown:?}"
        );
        deserialized
            .into_config(project_root.into())
            .expect("default config is always valid")
    }

    /// Returns the project root all other paths are relative to.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the build command, or `None` if building is disabled.
    pub fn build_command(&self) -> Option<&CommandLine> {
        self.build_command.as_ref()
    }

    /// Returns the coverage-generation command, or `None` if it is disabled.
    pub fn coverage_command(&self) -> Option<&CommandLine> {
        self.coverage_command.as_ref()
    }

    /// Returns the path to the GoogleTest XML report.
    pub fn report_path(&self) -> &Utf8Path {
        &self.report_path
    }

    /// Returns the directory containing `*.gcov.html` coverage documents.
    pub fn coverage_dir(&self) -> &Utf8Path {
        &self.coverage_dir
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(EngineConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let config: EngineConfigDeserialize =
            serde_ignored::deserialize(config, |path: serde_ignored::Path| {
                ignored.insert(path.to_string());
            })
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))?;

        Ok((config, ignored))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct EngineConfigDeserialize {
    build_command: String,
    coverage_command: String,
    report_path: Utf8PathBuf,
    coverage_dir: Utf8PathBuf,
}

impl EngineConfigDeserialize {
    fn into_config(self, project_root: Utf8PathBuf) -> Result<EngineConfig, ConfigParseErrorKind> {
        let parse_command = |key: &'static str, command: &str| {
            CommandLine::parse(command).map_err(|error| ConfigParseErrorKind::InvalidCommand {
                key,
                message: error.to_string(),
            })
        };

        Ok(EngineConfig {
            build_command: parse_command("build-command", &self.build_command)?,
            coverage_command: parse_command("coverage-command", &self.coverage_command)?,
            report_path: project_root.join(self.report_path),
            coverage_dir: project_root.join(self.coverage_dir),
            project_root,
        })
    }
}
