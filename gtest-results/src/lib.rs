// Copyright (c) The gtest-engine Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for gtest-engine.
//!
//! This crate turns the artifacts of a GoogleTest run into a single [`ResultSet`]:
//!
//! * [`report`] parses the XML test report into one entry per testcase;
//! * [`coverage`] reads the `*.gcov.html` documents under a directory into a [`CoverageIndex`];
//! * [`result`] joins the two, attaching the same coverage to every outcome.
//!
//! [`GTestEngine`] runs a project's build and coverage commands before doing the above.

pub mod command;
pub mod config;
pub mod coverage;
pub mod engine;
pub mod errors;
mod exit_codes;
pub mod report;
pub mod result;

pub use coverage::CoverageIndex;
pub use engine::{GTestEngine, TestEngine};
pub use exit_codes::EngineExitCode;
pub use result::ResultSet;
