//! docs-infra CLI.
//!
//! - [`cli`]: argument definitions
//! - `commands`: `load` and `types` implementations
//! - [`config`]: configuration loading and conversion into library options
//! - [`error`]: error types with actionable hints
//! - [`logger`]: tracing setup
//! - [`handler`]: the `process-types` handler served to other processes

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod handler;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
