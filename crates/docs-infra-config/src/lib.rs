//! Layered configuration for docs-infra.
//!
//! ```no_run
//! use docs_infra_config::DocsInfraConfig;
//!
//! let config = DocsInfraConfig::load(".").unwrap();
//! println!("max files per variant: {}", config.loader.max_files);
//! ```

pub mod config;
pub mod defaults;
pub mod error;
pub mod settings;

pub use config::{CONFIG_FILE_NAME, DocsInfraConfig, ENV_PREFIX, LoaderConfig, TypesConfig};
pub use error::{ConfigError, Result};
pub use settings::GlobalSettings;
