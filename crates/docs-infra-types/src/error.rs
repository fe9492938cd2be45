//! Error types for types-server coordination.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type for types-server operations
pub type Result<T> = std::result::Result<T, TypesError>;

/// Lock file errors.
///
/// Contention is not an error: [`LockFile::try_acquire`](crate::LockFile::try_acquire)
/// reports it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("Failed to create lock directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Lock file I/O error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Lock task failed: {0}")]
    Join(String),
}

/// IPC client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect after {attempts} attempt(s): {source}")]
    Connect {
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("Not connected to a types server")]
    NotConnected,

    #[error("Request {id} timed out after {after:?}")]
    Timeout { id: String, after: Duration },

    #[error("Types server error: {0}")]
    Server(String),

    #[error("IPC I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("IPC message encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed before request {0} was answered")]
    ConnectionClosed(String),
}

/// Top-level error for election, serving and readiness.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Types server endpoint '{endpoint}' not ready after {after:?}")]
    ReadyTimeout { endpoint: String, after: Duration },

    #[error("Failed to watch socket directory: {0}")]
    Watch(#[from] notify::Error),

    #[error("Failed to bind types server endpoint '{endpoint}': {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("Types session is shut down")]
    ShutDown,
}
