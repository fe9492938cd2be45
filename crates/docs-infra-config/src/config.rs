//! Configuration model and layered loading.
//!
//! Sources, lowest to highest priority:
//!
//! 1. Built-in defaults
//! 2. `docs-infra.toml` in the working directory, or an explicit file
//! 3. `DOCS_INFRA_*` environment variables, `__` separating sections
//!    (`DOCS_INFRA_LOADER__MAX_FILES=10`)
//!
//! Command line flags are applied on top by the CLI.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::defaults::*;
use crate::error::{ConfigError, Result};
use crate::settings::GlobalSettings;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "docs-infra.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "DOCS_INFRA_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Files per variant, entry included.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_include_dependencies")]
    pub include_dependencies: bool,

    /// Resolution order for extension-less imports.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_files: default_max_files(),
            include_dependencies: default_include_dependencies(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypesConfig {
    /// Base directory for the lock file and socket. CI temp directories
    /// (`RUNNER_TEMP`, `AGENT_TEMPDIRECTORY`) still take precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_dir: Option<PathBuf>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_stale_ms")]
    pub stale_ms: u64,

    #[serde(default = "default_renew_ms")]
    pub renew_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_connect_max_retries")]
    pub connect_max_retries: u32,

    #[serde(default = "default_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,

    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,

    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
}

impl Default for TypesConfig {
    fn default() -> Self {
        Self {
            socket_dir: None,
            namespace: default_namespace(),
            stale_ms: default_stale_ms(),
            renew_ms: default_renew_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            connect_max_retries: default_connect_max_retries(),
            connect_retry_delay_ms: default_connect_retry_delay_ms(),
            ready_timeout_ms: default_ready_timeout_ms(),
            ready_poll_ms: default_ready_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocsInfraConfig {
    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub types: TypesConfig,

    #[serde(default)]
    pub settings: GlobalSettings,
}

impl DocsInfraConfig {
    /// Load from `docs-infra.toml` in `root` (if present) and the environment.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let candidate = root.as_ref().join(CONFIG_FILE_NAME);
        let file = candidate.is_file().then_some(candidate);
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// Load from an explicit config file and the environment. The file must exist.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::from_figment(Self::figment(Some(path)))
    }

    /// The layered provider chain, for callers that want to merge more.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            debug!(path = %path.display(), "loading config file");
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.loader.max_files == 0 {
            return Err(ConfigError::InvalidValue {
                field: "loader.max_files",
                message: "must be at least 1 (the entry file counts)".to_string(),
            });
        }

        if self.loader.extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "loader.extensions",
                message: "at least one extension is required".to_string(),
            });
        }
        let malformed = self
            .loader
            .extensions
            .iter()
            .find(|e| !e.starts_with('.') || e.len() < 2);
        if let Some(ext) = malformed {
            return Err(ConfigError::InvalidValue {
                field: "loader.extensions",
                message: format!("'{ext}' must start with a dot, e.g. '.ts'"),
            });
        }

        if self.types.renew_ms == 0 || self.types.renew_ms >= self.types.stale_ms {
            return Err(ConfigError::InvalidValue {
                field: "types.renew_ms",
                message: format!(
                    "must be non-zero and below types.stale_ms ({}ms), got {}ms",
                    self.types.stale_ms, self.types.renew_ms
                ),
            });
        }

        if self.types.namespace.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "types.namespace",
                message: "must not be empty".to_string(),
            });
        }

        Ok(())
    }
}
