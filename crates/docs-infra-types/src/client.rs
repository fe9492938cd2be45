//! IPC client for a running types server.
//!
//! One connection carries any number of concurrent requests. Each request
//! gets a `req-<n>` id and a oneshot slot in the pending map; a background
//! reader task matches responses back by id, so replies may arrive in any
//! order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::endpoint::{IoBox, IpcEndpoint};
use crate::error::ClientError;
use crate::protocol::{FrameBuffer, IpcMessage};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default number of connect retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default delay between connect attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

type Reply = Result<Value, ClientError>;
type PendingMap = Arc<Mutex<FxHashMap<String, oneshot::Sender<Reply>>>>;
type Writer = Arc<tokio::sync::Mutex<Option<WriteHalf<IoBox>>>>;

pub struct SocketClient {
    endpoint: IpcEndpoint,
    options: ClientOptions,
    writer: Writer,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketClient")
            .field("endpoint", &self.endpoint)
            .field("pending", &self.pending_requests())
            .finish_non_exhaustive()
    }
}

impl SocketClient {
    pub fn new(endpoint: IpcEndpoint) -> Self {
        Self::with_options(endpoint, ClientOptions::default())
    }

    pub fn with_options(endpoint: IpcEndpoint, options: ClientOptions) -> Self {
        Self {
            endpoint,
            options,
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            pending: Arc::new(Mutex::new(FxHashMap::default())),
            next_id: AtomicU64::new(0),
            reader: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &IpcEndpoint {
        &self.endpoint
    }

    /// Connect, retrying up to `max_retries` times `retry_delay` apart.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut attempt: u32 = 0;
        loop {
            match self.endpoint.connect().await {
                Ok(io) => {
                    debug!(endpoint = %self.endpoint, attempt, "connected to types server");
                    self.attach(io).await;
                    return Ok(());
                }
                Err(err) if attempt < self.options.max_retries => {
                    attempt += 1;
                    debug!(endpoint = %self.endpoint, attempt, "connect failed, retrying: {}", err);
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(source) => {
                    return Err(ClientError::Connect {
                        attempts: attempt + 1,
                        source,
                    });
                }
            }
        }
    }

    async fn attach(&self, io: IoBox) {
        let (read_half, write_half) = tokio::io::split(io);
        *self.writer.lock().await = Some(write_half);

        let task = tokio::spawn(read_responses(
            read_half,
            self.pending.clone(),
            self.writer.clone(),
        ));
        if let Some(previous) = self.reader.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.writer
            .try_lock()
            .map(|writer| writer.is_some())
            .unwrap_or(true)
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send one `process-types` request and wait for its response.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if the connection is gone
    /// - [`ClientError::Timeout`] after `request_timeout`; the pending entry is evicted
    /// - [`ClientError::Server`] when the server answers with `error`
    pub async fn send_request(&self, data: Value) -> Result<Value, ClientError> {
        let id = format!("req-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let line = IpcMessage::ProcessTypes {
            id: id.clone(),
            data,
        }
        .to_line()?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id.clone(), tx);
        let _slot = PendingSlot {
            pending: &self.pending,
            id: &id,
        };

        self.write_line(&line).await?;
        debug!(id = %id, "sent process-types request");

        match tokio::time::timeout(self.options.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(ClientError::ConnectionClosed(id.clone())),
            Err(_) => {
                warn!(id = %id, "types request timed out");
                Err(ClientError::Timeout {
                    id: id.clone(),
                    after: self.options.request_timeout,
                })
            }
        }
    }

    /// Typed wrapper around [`send_request`](Self::send_request).
    pub async fn request<Req, Resp>(&self, request: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let data = serde_json::to_value(request)?;
        let response = self.send_request(data).await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn write_line(&self, line: &str) -> Result<(), ClientError> {
        let mut write = LineWrite {
            writer: self.writer.lock().await,
            finished: false,
        };
        let Some(stream) = write.writer.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;
        write.finished = true;
        Ok(())
    }

    /// Close the connection. In-flight requests fail with
    /// [`ClientError::ConnectionClosed`]. Safe to call repeatedly.
    pub async fn close(&self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        if let Some(mut stream) = self.writer.lock().await.take() {
            if let Err(err) = stream.shutdown().await {
                debug!("error closing types connection: {}", err);
            }
        }
        self.pending.lock().clear();
    }
}

impl Drop for SocketClient {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

/// Removes a request's pending entry however `send_request` ends,
/// including when its future is dropped.
struct PendingSlot<'a> {
    pending: &'a PendingMap,
    id: &'a str,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(self.id);
    }
}

/// A line write that did not finish leaves a partial frame on the wire, so
/// the connection is dropped rather than reused.
struct LineWrite<'a> {
    writer: tokio::sync::MutexGuard<'a, Option<WriteHalf<IoBox>>>,
    finished: bool,
}

impl Drop for LineWrite<'_> {
    fn drop(&mut self) {
        if !self.finished && self.writer.take().is_some() {
            warn!("types request write interrupted, closing connection");
        }
    }
}

async fn read_responses(mut reader: ReadHalf<IoBox>, pending: PendingMap, writer: Writer) {
    let mut frames = FrameBuffer::new();
    let mut chunk = vec![0u8; 8 * 1024];
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
            dispatch(&line, &pending);
        }
    }
    debug!("types server connection closed");
    // Requests already in flight run into their own timeouts.
    *writer.lock().await = None;
}

fn dispatch(line: &[u8], pending: &PendingMap) {
    let message = match IpcMessage::from_line(line) {
        Ok(message) => message,
        Err(err) => {
            warn!("dropping malformed IPC message: {}", err);
            return;
        }
    };
    let reply = match message {
        IpcMessage::Success { id, data } => (id, Ok(data)),
        IpcMessage::Error { id, data } => (id, Err(ClientError::Server(data.error))),
        IpcMessage::ProcessTypes { id, .. } => {
            warn!(id = %id, "unexpected request from server, dropping");
            return;
        }
    };
    let (id, result) = reply;
    match pending.lock().remove(&id) {
        Some(slot) => {
            let _ = slot.send(result);
        }
        None => debug!(id = %id, "response for unknown or expired request"),
    }
}
