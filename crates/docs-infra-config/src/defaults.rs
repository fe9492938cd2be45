//! Default values, shared by `Default` impls and `#[serde(default = ...)]`.

pub fn default_max_depth() -> usize {
    5
}

pub fn default_max_files() -> usize {
    50
}

pub fn default_include_dependencies() -> bool {
    true
}

pub fn default_extensions() -> Vec<String> {
    [".ts", ".tsx", ".js", ".jsx"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_namespace() -> String {
    "docs-infra-types".to_string()
}

pub fn default_stale_ms() -> u64 {
    3_000
}

pub fn default_renew_ms() -> u64 {
    1_000
}

pub fn default_request_timeout_ms() -> u64 {
    5 * 60 * 1_000
}

pub fn default_connect_max_retries() -> u32 {
    10
}

pub fn default_connect_retry_delay_ms() -> u64 {
    50
}

pub fn default_ready_timeout_ms() -> u64 {
    5_000
}

pub fn default_ready_poll_ms() -> u64 {
    100
}
