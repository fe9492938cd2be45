//! # docs-infra-types
//!
//! Shares one expensive TypeScript type-analysis instance between all the
//! processes of a docs build.
//!
//! The first process to take the lock file in the session's socket
//! directory becomes the server; every other process becomes an IPC client
//! of it. Messages are newline-delimited JSON envelopes over a Unix socket
//! (POSIX) or a named pipe (Windows).
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docs_infra_types::{TypesHandler, TypesOptions, shared_session, shutdown_shared_session};
//! use serde_json::{Value, json};
//!
//! struct Checker;
//!
//! #[async_trait::async_trait]
//! impl TypesHandler for Checker {
//!     async fn process_types(&self, request: Value) -> anyhow::Result<Value> {
//!         Ok(json!({ "entry": request["entry"] }))
//!     }
//! }
//!
//! # async fn run() -> docs_infra_types::Result<()> {
//! let session = shared_session(TypesOptions::default(), Arc::new(Checker)).await?;
//! let response = session.process_types(json!({ "entry": "/docs/Demo.tsx" })).await?;
//! println!("{response}");
//! shutdown_shared_session().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod endpoint;
pub mod error;
pub mod lock;
pub mod options;
pub mod paths;
pub mod protocol;
pub mod server;
pub mod session;

pub use client::{ClientOptions, SocketClient};
pub use endpoint::IpcEndpoint;
pub use error::{ClientError, LockError, Result, TypesError};
pub use lock::{
    LockFile, LockHandle, has_existing_worker, release_server_lock, try_acquire_server_lock,
};
pub use options::TypesOptions;
pub use paths::socket_dir;
pub use protocol::{DEFAULT_MAX_FRAME, ErrorData, FrameBuffer, IpcMessage};
pub use server::{TypesHandler, TypesServer};
pub use session::{ElectionState, TypesSession, shared_session, shutdown_shared_session};
