//! Error handling for the `docs-infra` binary.
//!
//! Library errors convert into [`CliError`] through `From`; [`ResultExt`]
//! attaches paths and context on the way up. `main` renders the final
//! error with [`cli_error_to_miette`].
//!
//! ```rust,no_run
//! use docs_infra_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_entry(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).with_path(path)
//! }
//! ```

pub mod miette;

use std::path::PathBuf;
use thiserror::Error;

use docs_infra_config::ConfigError;
use docs_infra_loader::LoadError;
use docs_infra_types::TypesError;

pub use self::miette::cli_error_to_miette;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Types server error: {0}")]
    Types(#[from] TypesError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Message with its context already folded in
    #[error("{0}")]
    Custom(String),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Prefix the error message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_error() {
        let err: CliError = ConfigError::NotFound(PathBuf::from("ci.toml")).into();
        assert!(matches!(err, CliError::Config(_)));
        assert!(err.to_string().contains("ci.toml"));
    }

    #[test]
    fn test_from_types_error() {
        let err: CliError = TypesError::ShutDown.into();
        assert!(matches!(err, CliError::Types(_)));
        assert!(err.to_string().contains("shut down"));
    }

    #[test]
    fn test_from_load_error() {
        let err: CliError = LoadError::InvalidEntry(PathBuf::from("/")).into();
        assert!(matches!(err, CliError::Load(_)));
    }

    #[test]
    fn test_with_path_maps_not_found() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = result.with_path("/docs/Demo.tsx").unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(p) if p == PathBuf::from("/docs/Demo.tsx")));
    }

    #[test]
    fn test_with_path_keeps_other_io_errors() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.with_path("/docs/Demo.tsx").unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }

    #[test]
    fn test_context_prefixes_message() {
        let result: std::result::Result<(), TypesError> = Err(TypesError::ShutDown);
        let msg = result.context("Request failed").unwrap_err().to_string();
        assert!(msg.starts_with("Request failed: "));
    }
}
