//! Bridges the layered config into library options.

use std::path::Path;
use std::time::Duration;

use docs_infra_config::{DocsInfraConfig, LoaderConfig, TypesConfig};
use docs_infra_loader::{LoaderOptions, ResolveOptions};
use docs_infra_types::{ClientOptions, TypesOptions};
use tracing::debug;

use crate::error::Result;

/// Load `--config <PATH>` if given, else `docs-infra.toml` from the working
/// directory when present. Environment variables apply either way.
pub fn load_config(explicit: Option<&Path>) -> Result<DocsInfraConfig> {
    let config = match explicit {
        Some(path) => DocsInfraConfig::load_file(path)?,
        None => DocsInfraConfig::load(std::env::current_dir()?)?,
    };
    debug!(?config, "configuration loaded");
    Ok(config)
}

pub fn loader_options(config: &LoaderConfig) -> LoaderOptions {
    LoaderOptions {
        max_depth: config.max_depth,
        max_files: config.max_files,
        include_dependencies: config.include_dependencies,
        resolve: ResolveOptions::with_extensions(config.extensions.iter().cloned()),
    }
}

pub fn types_options(config: &TypesConfig) -> TypesOptions {
    let mut options = TypesOptions::new()
        .with_namespace(config.namespace.clone())
        .with_lock_timing(
            Duration::from_millis(config.stale_ms),
            Duration::from_millis(config.renew_ms),
        )
        .with_client(ClientOptions {
            max_retries: config.connect_max_retries,
            retry_delay: Duration::from_millis(config.connect_retry_delay_ms),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        });
    options.ready_timeout = Duration::from_millis(config.ready_timeout_ms);
    options.ready_poll = Duration::from_millis(config.ready_poll_ms);
    if let Some(dir) = &config.socket_dir {
        options = options.with_socket_dir(dir.clone());
    }
    options
}
