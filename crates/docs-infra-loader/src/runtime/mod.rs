//! Filesystem abstraction for the variant loader.
//!
//! The loader never touches `std::fs` directly. Directory listings and file
//! contents are obtained through the [`DirectoryReader`] and [`Runtime`]
//! traits so that resolution can run against the real disk ([`NativeRuntime`])
//! or against an in-memory tree in tests.

pub mod native;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use native::NativeRuntime;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// File or directory not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),

    /// Other runtime error
    #[error("Runtime error: {0}")]
    Other(String),
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub is_file: bool,
    pub is_directory: bool,
}

impl DirectoryEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_file: true,
            is_directory: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_file: false,
            is_directory: true,
        }
    }
}

/// Lists directories. This is the only filesystem capability the path
/// resolver needs.
#[async_trait]
pub trait DirectoryReader: Send + Sync {
    /// Read the entries of the directory at `path` (absolute).
    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<DirectoryEntry>>;
}

/// Full runtime used by the dependency loader: directory listings plus file
/// contents.
#[async_trait]
pub trait Runtime: DirectoryReader + std::fmt::Debug {
    /// Read a file as UTF-8 text.
    async fn read_file(&self, path: &Path) -> RuntimeResult<String>;
}
