//! # Scantask Testing Utils
//!
//! Shared testing utilities for the scan-task coordination system.
//! This crate provides mock implementations and test data builders that
//! can be used across all other crates in the workspace.
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! scantask-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod mocks;

pub use builders::*;
pub use mocks::*;
