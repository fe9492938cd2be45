//! Platform IPC endpoint.
//!
//! Unix sockets on POSIX, named pipes on Windows. The variant is fixed at
//! compile time, so callers never branch on the platform themselves.

use std::fmt;
use std::io;
#[cfg(not(windows))]
use std::path::PathBuf;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::{Result, TypesError};

/// A bidirectional byte stream to the peer.
pub trait AsyncIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T> AsyncIo for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type IoBox = Box<dyn AsyncIo>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpcEndpoint {
    #[cfg(windows)]
    NamedPipe(String),
    #[cfg(not(windows))]
    UnixSocket(PathBuf),
}

impl IpcEndpoint {
    /// The server endpoint for a socket directory.
    pub fn for_socket_dir(dir: &Path) -> Self {
        #[cfg(windows)]
        {
            Self::NamedPipe(format!(
                r"\\?\pipe\{}\{}",
                dir.display(),
                crate::paths::PIPE_NAME
            ))
        }
        #[cfg(not(windows))]
        {
            Self::UnixSocket(dir.join(crate::paths::SOCKET_FILE_NAME))
        }
    }

    /// Whether something is listening, or was: a leftover socket file from a
    /// crashed server also counts.
    pub fn exists(&self) -> bool {
        #[cfg(windows)]
        {
            let Self::NamedPipe(name) = self;
            Path::new(name).exists()
        }
        #[cfg(not(windows))]
        {
            let Self::UnixSocket(path) = self;
            path.exists()
        }
    }

    /// One connection attempt.
    pub async fn connect(&self) -> io::Result<IoBox> {
        #[cfg(windows)]
        {
            use tokio::net::windows::named_pipe::ClientOptions;
            let Self::NamedPipe(name) = self;
            let client = ClientOptions::new().open(name)?;
            Ok(Box::new(client))
        }
        #[cfg(not(windows))]
        {
            let Self::UnixSocket(path) = self;
            let stream = tokio::net::UnixStream::connect(path).await?;
            Ok(Box::new(stream))
        }
    }

    /// Start listening. A leftover unix socket file is removed first.
    pub async fn bind(&self) -> io::Result<IpcListener> {
        #[cfg(windows)]
        {
            use tokio::net::windows::named_pipe::ServerOptions;
            let Self::NamedPipe(name) = self;
            let first = ServerOptions::new()
                .first_pipe_instance(true)
                .create(name)?;
            Ok(IpcListener::NamedPipe {
                name: name.clone(),
                next: tokio::sync::Mutex::new(first),
            })
        }
        #[cfg(not(windows))]
        {
            let Self::UnixSocket(path) = self;
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            if path.exists() {
                debug!(path = %path.display(), "removing leftover socket file");
                std::fs::remove_file(path)?;
            }
            let listener = tokio::net::UnixListener::bind(path)?;
            Ok(IpcListener::Unix(listener))
        }
    }

    /// Remove the socket file. Named pipes vanish with their last handle.
    pub fn cleanup(&self) {
        #[cfg(not(windows))]
        {
            let Self::UnixSocket(path) = self;
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed socket file"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => debug!(path = %path.display(), "failed to remove socket file: {}", err),
            }
        }
    }

    /// Wait until a server endpoint shows up.
    ///
    /// On POSIX the socket directory is watched for the socket file (after
    /// an initial existence check). Named pipes are not filesystem entries,
    /// so on Windows a connection is attempted every `poll`.
    pub async fn wait_ready(&self, timeout: Duration, poll: Duration) -> Result<()> {
        #[cfg(windows)]
        {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                match self.connect().await {
                    Ok(_stream) => return Ok(()),
                    // ERROR_PIPE_BUSY: the pipe exists, all instances are taken.
                    Err(err) if err.raw_os_error() == Some(231) => return Ok(()),
                    Err(_) if tokio::time::Instant::now() < deadline => {
                        tokio::time::sleep(poll).await;
                    }
                    Err(_) => {
                        return Err(TypesError::ReadyTimeout {
                            endpoint: self.to_string(),
                            after: timeout,
                        });
                    }
                }
            }
        }
        #[cfg(not(windows))]
        {
            let _ = poll;
            let Self::UnixSocket(path) = self;
            wait_for_socket_file(path, timeout).await.map_err(|err| match err {
                TypesError::ReadyTimeout { .. } => TypesError::ReadyTimeout {
                    endpoint: self.to_string(),
                    after: timeout,
                },
                other => other,
            })
        }
    }
}

#[cfg(not(windows))]
async fn wait_for_socket_file(path: &Path, timeout: Duration) -> Result<()> {
    use notify::{Event, RecursiveMode, Watcher};
    use tokio::sync::mpsc;

    let Some(dir) = path.parent() else {
        return Err(TypesError::ReadyTimeout {
            endpoint: path.display().to_string(),
            after: timeout,
        });
    };

    let (tx, mut rx) = mpsc::channel(16);
    let expected = path.file_name().map(|n| n.to_os_string());
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            let named = event
                .paths
                .iter()
                .any(|p| p.file_name().map(|n| n.to_os_string()) == expected);
            if named {
                let _ = tx.try_send(());
            }
        }
    })?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    // The server may have bound before the watch started.
    if path.exists() {
        return Ok(());
    }

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(())) if path.exists() => return Ok(()),
            Ok(Some(())) => continue,
            Ok(None) | Err(_) => {
                if path.exists() {
                    return Ok(());
                }
                return Err(TypesError::ReadyTimeout {
                    endpoint: path.display().to_string(),
                    after: timeout,
                });
            }
        }
    }
}

impl fmt::Display for IpcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(windows)]
            Self::NamedPipe(name) => f.write_str(name),
            #[cfg(not(windows))]
            Self::UnixSocket(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A bound endpoint accepting connections.
pub enum IpcListener {
    #[cfg(windows)]
    NamedPipe {
        name: String,
        next: tokio::sync::Mutex<tokio::net::windows::named_pipe::NamedPipeServer>,
    },
    #[cfg(not(windows))]
    Unix(tokio::net::UnixListener),
}

impl IpcListener {
    pub async fn accept(&self) -> io::Result<IoBox> {
        #[cfg(windows)]
        {
            use tokio::net::windows::named_pipe::ServerOptions;
            let Self::NamedPipe { name, next } = self;
            let mut pending = next.lock().await;
            pending.connect().await?;
            let fresh = ServerOptions::new().create(name)?;
            let connected = std::mem::replace(&mut *pending, fresh);
            Ok(Box::new(connected))
        }
        #[cfg(not(windows))]
        {
            let Self::Unix(listener) = self;
            let (stream, _) = listener.accept().await?;
            Ok(Box::new(stream))
        }
    }
}
