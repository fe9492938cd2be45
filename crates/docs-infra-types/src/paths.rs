//! Well-known locations shared by every process of a build session.
//!
//! All processes must derive the same socket directory without talking to
//! each other, so the derivation only looks at the environment and at the
//! caller-supplied directory. CI runners get their own temp directory so
//! that concurrent jobs on one machine never see each other's server.

use std::env;
use std::path::{Path, PathBuf};

/// Environment variables naming a per-job temp directory on CI
/// (GitHub Actions, Azure Pipelines), checked in order.
pub const CI_TEMP_DIR_VARS: &[&str] = &["RUNNER_TEMP", "AGENT_TEMPDIRECTORY"];

/// Default per-tool namespace appended to the socket directory.
pub const DEFAULT_NAMESPACE: &str = "docs-infra-types";

/// Lock file name inside the socket directory.
pub const LOCK_FILE_NAME: &str = "types.lock";

/// Unix socket file name inside the socket directory.
pub const SOCKET_FILE_NAME: &str = "types.sock";

/// Named pipe leaf name on Windows.
pub const PIPE_NAME: &str = "types";

fn ci_temp_dir() -> Option<PathBuf> {
    CI_TEMP_DIR_VARS.iter().find_map(|var| {
        env::var_os(var)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    })
}

/// Resolve the socket directory.
///
/// Precedence: CI temp directory > `explicit` > OS temp directory. The
/// result is always suffixed with `namespace`.
pub fn socket_dir(explicit: Option<&Path>, namespace: &str) -> PathBuf {
    let base = ci_temp_dir()
        .or_else(|| explicit.map(Path::to_path_buf))
        .unwrap_or_else(env::temp_dir);
    base.join(namespace)
}

pub fn lock_path(socket_dir: &Path) -> PathBuf {
    socket_dir.join(LOCK_FILE_NAME)
}
