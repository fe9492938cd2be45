//! Session options.

use std::path::PathBuf;
use std::time::Duration;

use crate::client::ClientOptions;
use crate::endpoint::IpcEndpoint;
use crate::lock::LockFile;
use crate::paths::{self, DEFAULT_NAMESPACE};

/// How long a lock may go without renewal before a contender reclaims it.
pub const DEFAULT_STALE: Duration = Duration::from_millis(3000);

/// How often the holder refreshes the lock.
pub const DEFAULT_RENEW: Duration = Duration::from_millis(1000);

/// How long a client waits for a freshly elected server to appear.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Poll interval for readiness where the endpoint cannot be watched.
pub const DEFAULT_READY_POLL: Duration = Duration::from_millis(100);

/// Everything a process needs to take part in an election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypesOptions {
    /// Caller-supplied base directory. CI temp directories still win.
    pub socket_dir: Option<PathBuf>,
    pub namespace: String,
    pub stale: Duration,
    pub renew: Duration,
    pub ready_timeout: Duration,
    pub ready_poll: Duration,
    pub client: ClientOptions,
}

impl Default for TypesOptions {
    fn default() -> Self {
        Self {
            socket_dir: None,
            namespace: DEFAULT_NAMESPACE.to_string(),
            stale: DEFAULT_STALE,
            renew: DEFAULT_RENEW,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            ready_poll: DEFAULT_READY_POLL,
            client: ClientOptions::default(),
        }
    }
}

impl TypesOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_socket_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = Some(dir.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_lock_timing(mut self, stale: Duration, renew: Duration) -> Self {
        self.stale = stale;
        self.renew = renew;
        self
    }

    pub fn with_client(mut self, client: ClientOptions) -> Self {
        self.client = client;
        self
    }

    /// The namespaced directory holding the lock file and socket.
    pub fn resolved_socket_dir(&self) -> PathBuf {
        paths::socket_dir(self.socket_dir.as_deref(), &self.namespace)
    }

    pub fn endpoint(&self) -> IpcEndpoint {
        IpcEndpoint::for_socket_dir(&self.resolved_socket_dir())
    }

    pub fn lock_file(&self) -> LockFile {
        LockFile::new(paths::lock_path(&self.resolved_socket_dir()))
            .with_stale(self.stale)
            .with_renew(self.renew)
    }
}
