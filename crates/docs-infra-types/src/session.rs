//! Election and the process-scoped session.
//!
//! Every process that needs type information calls [`TypesSession::elect`].
//! Exactly one process per socket directory wins the lock and serves; the
//! rest connect to it as clients.
//!
//! ```text
//! Unelected ─▶ Acquiring ─┬─▶ Server ─┐
//!                         └─▶ Client ─┴─▶ ShutDown
//! ```

use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::SocketClient;
use crate::error::{ClientError, Result, TypesError};
use crate::options::TypesOptions;
use crate::server::{TypesHandler, TypesServer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionState {
    Unelected,
    Acquiring,
    Server,
    Client,
    ShutDown,
}

#[derive(Debug, Clone)]
enum Role {
    Server(Arc<TypesServer>),
    Client(Arc<SocketClient>),
}

pub struct TypesSession {
    options: TypesOptions,
    handler: Arc<dyn TypesHandler>,
    state: Mutex<ElectionState>,
    role: Mutex<Option<Role>>,
}

impl std::fmt::Debug for TypesSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypesSession")
            .field("state", &self.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TypesSession {
    /// Run the election and return the session in `Server` or `Client` state.
    ///
    /// 1. An existing endpoint is tried as a client first
    /// 2. Otherwise the lock decides: the winner binds and serves
    /// 3. Losers wait for the winner's endpoint and connect
    pub async fn elect(options: TypesOptions, handler: Arc<dyn TypesHandler>) -> Result<Self> {
        let session = Self {
            options,
            handler,
            state: Mutex::new(ElectionState::Unelected),
            role: Mutex::new(None),
        };
        session.set_state(ElectionState::Acquiring);

        match session.run_election().await {
            Ok(role) => {
                let state = match role {
                    Role::Server(_) => ElectionState::Server,
                    Role::Client(_) => ElectionState::Client,
                };
                *session.role.lock() = Some(role);
                session.set_state(state);
                Ok(session)
            }
            Err(err) => {
                session.set_state(ElectionState::Unelected);
                Err(err)
            }
        }
    }

    async fn run_election(&self) -> Result<Role> {
        let endpoint = self.options.endpoint();

        if endpoint.exists() {
            let client = SocketClient::with_options(endpoint.clone(), self.options.client.clone());
            match client.connect().await {
                Ok(()) => {
                    info!(endpoint = %endpoint, "joined existing types server");
                    return Ok(Role::Client(Arc::new(client)));
                }
                Err(err) => {
                    debug!(endpoint = %endpoint, "existing endpoint not answering: {}", err)
                }
            }
        }

        match self.options.lock_file().try_acquire().await {
            Ok(Some(lock)) => {
                let server = TypesServer::start(endpoint, self.handler.clone(), Some(lock)).await?;
                info!(endpoint = %server.endpoint(), "elected as types server");
                return Ok(Role::Server(Arc::new(server)));
            }
            Ok(None) => debug!("types server lock held elsewhere, joining as client"),
            Err(err) => warn!("types server lock failed, joining as client: {}", err),
        }

        endpoint
            .wait_ready(self.options.ready_timeout, self.options.ready_poll)
            .await?;
        let client = SocketClient::with_options(endpoint.clone(), self.options.client.clone());
        client.connect().await?;
        info!(endpoint = %endpoint, "connected to elected types server");
        Ok(Role::Client(Arc::new(client)))
    }

    fn set_state(&self, state: ElectionState) {
        *self.state.lock() = state;
    }

    pub fn state(&self) -> ElectionState {
        *self.state.lock()
    }

    pub fn is_server(&self) -> bool {
        self.state() == ElectionState::Server
    }

    pub fn options(&self) -> &TypesOptions {
        &self.options
    }

    /// Run a `process-types` request: in-process when serving, over IPC
    /// otherwise.
    pub async fn process_types(&self, request: Value) -> Result<Value> {
        let role = self.role.lock().clone();
        match role {
            Some(Role::Server(_)) => self
                .handler
                .process_types(request)
                .await
                .map_err(|err| ClientError::Server(format!("{err:#}")).into()),
            Some(Role::Client(client)) => Ok(client.send_request(request).await?),
            None => Err(TypesError::ShutDown),
        }
    }

    /// Tear down the server or close the client. Idempotent.
    pub async fn shutdown(&self) {
        let role = self.role.lock().take();
        match role {
            Some(Role::Server(server)) => server.shutdown().await,
            Some(Role::Client(client)) => client.close().await,
            None => {}
        }
        self.set_state(ElectionState::ShutDown);
    }
}

static SHARED_SESSION: LazyLock<tokio::sync::Mutex<Option<Arc<TypesSession>>>> =
    LazyLock::new(|| tokio::sync::Mutex::new(None));

/// The process-wide session, elected on first use.
///
/// Later calls return the same session and ignore their arguments until
/// [`shutdown_shared_session`] runs.
pub async fn shared_session(
    options: TypesOptions,
    handler: Arc<dyn TypesHandler>,
) -> Result<Arc<TypesSession>> {
    let mut slot = SHARED_SESSION.lock().await;
    if let Some(session) = slot.as_ref() {
        if session.state() != ElectionState::ShutDown {
            return Ok(session.clone());
        }
    }
    let session = Arc::new(TypesSession::elect(options, handler).await?);
    *slot = Some(session.clone());
    Ok(session)
}

/// Shut down and forget the process-wide session, if any.
pub async fn shutdown_shared_session() {
    let session = SHARED_SESSION.lock().await.take();
    if let Some(session) = session {
        session.shutdown().await;
    }
}
