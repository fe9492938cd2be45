//! The types server: accepts connections and answers `process-types`
//! requests with a [`TypesHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt, WriteHalf};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::endpoint::{IoBox, IpcEndpoint, IpcListener};
use crate::error::{Result, TypesError};
use crate::lock::LockHandle;
use crate::protocol::{FrameBuffer, IpcMessage};

/// The expensive shared work behind the server.
#[async_trait]
pub trait TypesHandler: Send + Sync + 'static {
    async fn process_types(&self, request: Value) -> anyhow::Result<Value>;
}

pub struct TypesServer {
    endpoint: IpcEndpoint,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    lock: Mutex<Option<LockHandle>>,
}

impl std::fmt::Debug for TypesServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypesServer")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl TypesServer {
    /// Bind `endpoint` and start serving. When `lock` is given the server
    /// owns it and releases it on shutdown.
    pub async fn start(
        endpoint: IpcEndpoint,
        handler: Arc<dyn TypesHandler>,
        lock: Option<LockHandle>,
    ) -> Result<Self> {
        let listener = endpoint.bind().await.map_err(|source| TypesError::Bind {
            endpoint: endpoint.to_string(),
            source,
        })?;
        info!(endpoint = %endpoint, "types server listening");

        let (shutdown, stop) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(listener, handler, stop));

        Ok(Self {
            endpoint,
            shutdown,
            accept_task: Mutex::new(Some(accept_task)),
            lock: Mutex::new(lock),
        })
    }

    pub fn endpoint(&self) -> &IpcEndpoint {
        &self.endpoint
    }

    /// Stop accepting, drop open connections, remove the socket file and
    /// release the lock. Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let accept_task = self.accept_task.lock().take();
        if let Some(task) = accept_task {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!("types server accept loop failed: {}", err);
                }
            }
            self.endpoint.cleanup();
            info!(endpoint = %self.endpoint, "types server stopped");
        }

        let lock = self.lock.lock().take();
        if let Some(lock) = lock {
            if let Err(err) = lock.release().await {
                warn!("failed to release types server lock: {}", err);
            }
        }
    }
}

impl Drop for TypesServer {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.get_mut().take() {
            task.abort();
            self.endpoint.cleanup();
        }
    }
}

async fn accept_loop(
    listener: IpcListener,
    handler: Arc<dyn TypesHandler>,
    mut stop: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok(io) => {
                    debug!("types client connected");
                    connections.spawn(serve_connection(io, handler.clone()));
                }
                Err(err) => {
                    warn!("failed to accept types connection: {}", err);
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            },
        }
        while connections.try_join_next().is_some() {}
    }
    connections.shutdown().await;
}

type SharedWriter = Arc<tokio::sync::Mutex<WriteHalf<IoBox>>>;

async fn serve_connection(io: IoBox, handler: Arc<dyn TypesHandler>) {
    let (mut reader, writer) = tokio::io::split(io);
    let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(writer));
    let mut frames = FrameBuffer::new();
    let mut chunk = vec![0u8; 8 * 1024];
    let mut requests = JoinSet::new();

    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                debug!("types connection read failed: {}", err);
                break;
            }
        };
        for line in frames.push(&chunk[..read]) {
            match IpcMessage::from_line(&line) {
                Ok(IpcMessage::ProcessTypes { id, data }) => {
                    requests.spawn(respond(id, data, handler.clone(), writer.clone()));
                }
                Ok(other) => {
                    warn!(id = %other.id(), "unexpected message from client, dropping");
                }
                Err(err) => warn!("dropping malformed IPC message: {}", err),
            }
        }
        while requests.try_join_next().is_some() {}
    }

    while requests.join_next().await.is_some() {}
    debug!("types client disconnected");
}

async fn respond(id: String, data: Value, handler: Arc<dyn TypesHandler>, writer: SharedWriter) {
    debug!(id = %id, "processing types request");
    let reply = match handler.process_types(data).await {
        Ok(data) => IpcMessage::Success { id, data },
        Err(err) => {
            warn!(id = %id, "types request failed: {:#}", err);
            IpcMessage::error(id, format!("{err:#}"))
        }
    };
    let line = match reply.to_line() {
        Ok(line) => line,
        Err(err) => {
            warn!(id = %reply.id(), "failed to encode response: {}", err);
            IpcMessage::error(reply.id(), format!("failed to encode response: {err}"))
                .to_line()
                .unwrap_or_default()
        }
    };

    let mut writer = writer.lock().await;
    let written = match writer.write_all(line.as_bytes()).await {
        Ok(()) => writer.flush().await,
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        debug!(id = %reply.id(), "failed to write response: {}", err);
    }
}
