//! Global settings shared by every command.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Default log filter (e.g. `"debug"`, `"docs_infra_types=trace"`),
    /// used when neither `RUST_LOG` nor a verbosity flag is given.
    #[serde(default)]
    pub log_level: Option<String>,
}
