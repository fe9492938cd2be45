//! Output types of a variant load.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Content of one dependency file in a flattened variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantExtraFile {
    pub source: String,
}

/// One variant of a code sample with its flattened dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantCode {
    /// Flat name of the entry file.
    pub file_name: String,
    /// Entry source with imports rewritten.
    pub source: String,
    /// Dependencies keyed by flat file name.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra_files: IndexMap<String, VariantExtraFile>,
    /// Entry first, then dependencies in discovery order.
    pub files_order: Vec<String>,
}

impl VariantCode {
    /// Number of files, entry included.
    pub fn file_count(&self) -> usize {
        1 + self.extra_files.len()
    }
}

/// Result of [`load_variant_code_with_dependencies`](super::load_variant_code_with_dependencies).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedVariant {
    pub variant: VariantCode,
    /// Absolute paths of every loaded file, entry first.
    pub visited_files: Vec<PathBuf>,
    /// Dependencies that were skipped, with the reason.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl LoadedVariant {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
