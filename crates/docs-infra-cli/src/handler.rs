//! The `process-types` handler served by an elected `docs-infra` process.
//!
//! A request names an entry file; the reply is the loaded variant as JSON.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use docs_infra_loader::{LoaderOptions, NativeRuntime, load_variant_code_with_dependencies};
use docs_infra_types::TypesHandler;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Per-request overrides of the server's loader defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_dependencies: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantRequest {
    pub entry: PathBuf,
    #[serde(default)]
    pub options: RequestOptions,
}

#[derive(Debug, Clone, Default)]
pub struct VariantHandler {
    defaults: LoaderOptions,
}

impl VariantHandler {
    pub fn new(defaults: LoaderOptions) -> Self {
        Self { defaults }
    }

    fn options_for(&self, overrides: &RequestOptions) -> LoaderOptions {
        let mut options = self.defaults.clone();
        if let Some(max_depth) = overrides.max_depth {
            options.max_depth = max_depth;
        }
        if let Some(max_files) = overrides.max_files {
            options.max_files = max_files;
        }
        if let Some(include) = overrides.include_dependencies {
            options.include_dependencies = include;
        }
        options
    }
}

#[async_trait]
impl TypesHandler for VariantHandler {
    async fn process_types(&self, request: Value) -> anyhow::Result<Value> {
        let request: VariantRequest =
            serde_json::from_value(request).context("invalid process-types request")?;
        anyhow::ensure!(
            request.options.max_files != Some(0),
            "maxFiles must be at least 1"
        );
        let options = self.options_for(&request.options);
        debug!(entry = %request.entry.display(), "processing types request");

        let loaded =
            load_variant_code_with_dependencies(&request.entry, &NativeRuntime::new(), &options)
                .await?;
        Ok(serde_json::to_value(loaded)?)
    }
}
