//! # Orchestrator Testing Utils
//!
//! Shared testing utilities for the orchestrator workspace: test data builders,
//! recording test doubles for the worker and host probe ports, and async helpers.
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! orchestrator-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```rust,ignore
//! use orchestrator_testing_utils::{JobBuilder, MockWorker};
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
