//! End-to-end tests of the `docs-infra` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn docs_infra(cwd: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("docs-infra").unwrap();
    cmd.current_dir(cwd)
        .env_remove("RUST_LOG")
        .env_remove("RUNNER_TEMP")
        .env_remove("AGENT_TEMPDIRECTORY")
        .env("NO_COLOR", "1");
    cmd
}

fn demo_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("demo")).unwrap();
    fs::create_dir_all(temp.path().join("shared")).unwrap();
    fs::write(
        temp.path().join("demo/Demo.tsx"),
        "import { Badge } from '../shared/Badge';\nexport default () => <Badge />;\n",
    )
    .unwrap();
    fs::write(
        temp.path().join("shared/Badge.tsx"),
        "export const Badge = () => null;\n",
    )
    .unwrap();
    temp
}

#[test]
fn test_load_json_output() {
    let temp = demo_tree();
    let output = docs_infra(temp.path())
        .args(["load", "demo/Demo.tsx", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        json["variant"]["filesOrder"],
        serde_json::json!(["Demo.tsx", "Badge.tsx"])
    );
    assert!(
        json["variant"]["source"]
            .as_str()
            .unwrap()
            .contains("from './Badge'")
    );
}

#[test]
fn test_load_summary_on_stderr() {
    let temp = demo_tree();
    docs_infra(temp.path())
        .args(["load", "demo/Demo.tsx"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Loaded 2 files"));
}

#[test]
fn test_load_respects_config_file() {
    let temp = demo_tree();
    fs::write(
        temp.path().join("docs-infra.toml"),
        "[loader]\ninclude_dependencies = false\n",
    )
    .unwrap();

    docs_infra(temp.path())
        .args(["load", "demo/Demo.tsx"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Loaded 1 file "));
}

#[test]
fn test_load_missing_entry_fails() {
    let temp = TempDir::new().unwrap();
    docs_infra(temp.path())
        .args(["load", "Nope.tsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nope.tsx"));
}

#[test]
fn test_load_rejects_zero_max_files() {
    let temp = demo_tree();
    docs_infra(temp.path())
        .args(["load", "demo/Demo.tsx", "--max-files", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--max-files"));
}

#[test]
fn test_missing_config_file_fails() {
    let temp = demo_tree();
    docs_infra(temp.path())
        .args(["--config", "absent.toml", "load", "demo/Demo.tsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.toml"));
}

#[test]
fn test_types_status_without_server() {
    let temp = TempDir::new().unwrap();
    docs_infra(temp.path())
        .args(["types", "status", "--socket-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("No types server is running"));
}

#[cfg(unix)]
#[test]
fn test_types_request_elects_and_answers() {
    let temp = demo_tree();
    let output = docs_infra(temp.path())
        .args(["types", "request", "demo/Demo.tsx", "--socket-dir"])
        .arg(temp.path().join("sockets"))
        .output()
        .unwrap();

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["variant"]["fileName"], "Demo.tsx");
    assert!(
        !temp
            .path()
            .join("sockets/docs-infra-types/types.sock")
            .exists()
    );
}
