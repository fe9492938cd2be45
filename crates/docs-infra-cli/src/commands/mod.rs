//! Command implementations.
//!
//! - [`load`] - load one code variant with its dependencies
//! - [`types`] - serve, query or inspect the shared types server
//!
//! Each module exposes an `execute` function taking the parsed arguments and
//! the loaded configuration.

pub mod load;
pub mod types;

pub use load::execute as load_execute;
pub use types::execute as types_execute;
