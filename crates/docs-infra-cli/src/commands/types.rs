//! `docs-infra types` implementation.
//!
//! - `serve`: join the election; the winner serves until Ctrl-C
//! - `request`: elect or join, send one request, print the reply
//! - `status`: report where the server lives and whether it is up

use std::path::PathBuf;
use std::sync::Arc;

use docs_infra_config::DocsInfraConfig;
use docs_infra_types::{TypesOptions, TypesSession, shared_session, shutdown_shared_session};
use serde_json::Value;
use tracing::info;

use crate::cli::{TypesArgs, TypesCommand};
use crate::config::{loader_options, types_options};
use crate::error::{Result, ResultExt};
use crate::handler::{RequestOptions, VariantHandler, VariantRequest};
use crate::ui;

pub async fn execute(args: TypesArgs, config: &DocsInfraConfig) -> Result<()> {
    let mut options = types_options(&config.types);
    if let Some(dir) = args.socket_dir {
        options = options.with_socket_dir(dir);
    }
    let handler = Arc::new(VariantHandler::new(loader_options(&config.loader)));

    match args.command {
        TypesCommand::Serve => serve(options, handler).await,
        TypesCommand::Request {
            entry,
            max_depth,
            max_files,
        } => {
            let request = VariantRequest {
                entry: std::path::absolute(&entry).with_path(&entry)?,
                options: RequestOptions {
                    max_depth,
                    max_files,
                    include_dependencies: None,
                },
            };
            request_once(options, handler, request).await
        }
        TypesCommand::Status => {
            status(&options);
            Ok(())
        }
    }
}

async fn serve(options: TypesOptions, handler: Arc<VariantHandler>) -> Result<()> {
    let session = TypesSession::elect(options, handler).await?;
    let endpoint = session.options().endpoint();

    if !session.is_server() {
        ui::info(&format!("A types server is already running at {endpoint}"));
        session.shutdown().await;
        return Ok(());
    }

    ui::success(&format!("Serving types at {endpoint}"));
    ui::info("Press Ctrl-C to stop");
    let signal = tokio::signal::ctrl_c().await;
    info!("shutting down types server");
    session.shutdown().await;
    signal.context("Failed to listen for Ctrl-C")?;
    ui::success("Types server stopped");
    Ok(())
}

async fn request_once(
    options: TypesOptions,
    handler: Arc<VariantHandler>,
    request: VariantRequest,
) -> Result<()> {
    let session = shared_session(options, handler).await?;
    let role = if session.is_server() { "server" } else { "client" };
    info!(role, "types session ready");

    let reply = session.process_types(request_payload(&request)?).await;
    shutdown_shared_session().await;

    println!("{}", serde_json::to_string_pretty(&reply?)?);
    Ok(())
}

fn request_payload(request: &VariantRequest) -> Result<Value> {
    Ok(serde_json::to_value(request)?)
}

/// What `status` reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypesStatus {
    pub socket_dir: PathBuf,
    pub endpoint: String,
    pub endpoint_exists: bool,
    pub lock_file: PathBuf,
    pub lock_held: bool,
}

impl TypesStatus {
    pub fn inspect(options: &TypesOptions) -> Self {
        let endpoint = options.endpoint();
        let lock = options.lock_file();
        Self {
            socket_dir: options.resolved_socket_dir(),
            endpoint: endpoint.to_string(),
            endpoint_exists: endpoint.exists(),
            lock_held: lock.is_held(),
            lock_file: lock.path().to_path_buf(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.endpoint_exists && self.lock_held
    }
}

fn status(options: &TypesOptions) {
    let status = TypesStatus::inspect(options);
    if status.is_running() {
        ui::success("Types server is running");
    } else if status.lock_held {
        ui::warning("Lock is held but the endpoint is missing (server starting or stuck)");
    } else if status.endpoint_exists {
        ui::warning("Endpoint exists without a live lock (leftover from a crashed server)");
    } else {
        ui::info("No types server is running");
    }
    ui::detail("socket dir", status.socket_dir.display());
    ui::detail("endpoint", &status.endpoint);
    ui::detail("lock file", status.lock_file.display());
}
