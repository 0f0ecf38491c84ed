//! Integration tests for the `leavesync` CLI binary.
//!
//! Argument parsing, config management against a temp config file, and
//! the server-bound commands against a mock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `leavesync` binary with env isolation.
///
/// Clears all `LEAVESYNC_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn leavesync_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("leavesync");
    cmd.env("HOME", "/tmp/leavesync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/leavesync-cli-test-nonexistent")
        .env_remove("LEAVESYNC_PROFILE")
        .env_remove("LEAVESYNC_CONFIG")
        .env_remove("LEAVESYNC_SERVER")
        .env_remove("LEAVESYNC_TENANT")
        .env_remove("LEAVESYNC_OUTPUT")
        .env_remove("LEAVESYNC_INSECURE")
        .env_remove("RUST_LOG");
    cmd
}

/// Same as [`leavesync_cmd`] with `--config` pointing at `path`.
fn with_config(path: &Path) -> assert_cmd::Command {
    let mut cmd = leavesync_cmd();
    cmd.arg("--config").arg(path);
    cmd
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Run a blocking command off the async test runtime.
async fn run_blocking(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = leavesync_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    leavesync_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("watch")
            .and(predicate::str::contains("publish"))
            .and(predicate::str::contains("health")),
    );
}

#[test]
fn test_version_flag() {
    leavesync_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("leavesync"));
}

#[test]
fn test_completions_bash() {
    leavesync_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_missing_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = with_config(&dir.path().join("config.toml"))
        .arg("health")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("No configuration found"));
}

#[test]
fn test_unknown_profile_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = with_config(&dir.path().join("config.toml"))
        .args(["--profile", "nope", "health"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("nope"));
}

#[test]
fn test_profile_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    with_config(&config)
        .args([
            "config",
            "add",
            "prod",
            "--url",
            "https://sync.example.com",
            "--tenant-id",
            "acme",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved profile 'prod'"));

    with_config(&config)
        .args([
            "config",
            "add",
            "staging",
            "--url",
            "http://127.0.0.1:8000",
            "--tenant-id",
            "acme-staging",
            "--polling-only",
        ])
        .assert()
        .success();

    with_config(&config)
        .args(["config", "profiles", "-o", "plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prod").and(predicate::str::contains("staging")));

    with_config(&config)
        .args(["config", "use", "staging"])
        .assert()
        .success();

    let written = std::fs::read_to_string(&config).unwrap();
    assert!(written.contains("default_profile = \"staging\""));
    assert!(written.contains("tenant_id = \"acme-staging\""));

    with_config(&config)
        .args(["config", "remove", "staging"])
        .assert()
        .success();
    with_config(&config)
        .args(["config", "use", "staging"])
        .assert()
        .code(4);
}

#[test]
fn test_add_rejects_bad_url() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    with_config(&config)
        .args(["config", "add", "bad", "--url", "not a url", "--tenant-id", "acme"])
        .assert()
        .failure();
    assert!(!config.exists());
}

// ── Server commands ─────────────────────────────────────────────────

#[tokio::test]
async fn test_health_online() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = with_config(&dir.path().join("config.toml"));
    cmd.args(["--server", &server.uri(), "--tenant", "acme", "health"]);
    let output = run_blocking(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("online"));
}

#[test]
fn test_health_offline_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let server = format!("http://127.0.0.1:{}", closed_port());
    let output = with_config(&dir.path().join("config.toml"))
        .args(["--server", &server, "--tenant", "acme", "health"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
    assert!(combined_output(&output).contains("offline"));
}

#[tokio::test]
async fn test_watch_prints_polled_event() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tenants/acme/changes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "has_changes": true,
            "change_type": "vacation_created",
            "details": { "vacation_id": 5 }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = with_config(&dir.path().join("config.toml"));
    cmd.args([
        "--server",
        &server.uri(),
        "--tenant",
        "acme",
        "--no-websocket",
        "-o",
        "json-compact",
        "watch",
        "--max-events",
        "1",
        "--duration",
        "10s",
    ]);
    let output = run_blocking(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next().unwrap();
    let frame: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(frame["change_type"], "vacation_created");
    assert_eq!(frame["details"]["vacation_id"], 5);
    assert_eq!(frame["tenant_id"], "acme");
}

#[tokio::test]
async fn test_publish_posts_notify() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tenants/acme/notify"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = with_config(&dir.path().join("config.toml"));
    cmd.args([
        "--server",
        &server.uri(),
        "--tenant",
        "acme",
        "publish",
        "vacation_deleted",
        "--details",
        r#"{"vacation_id": 3}"#,
    ]);
    let output = run_blocking(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("published vacation_deleted"));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = requests[0].body_json().unwrap();
    assert_eq!(body["details"]["vacation_id"], 3);
    assert_eq!(body["source"], "client");
}

#[tokio::test]
async fn test_publish_rejected_by_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tenants/acme/notify"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = with_config(&dir.path().join("config.toml"));
    cmd.args(["--server", &server.uri(), "--tenant", "acme", "publish", "test_signal"]);
    let output = run_blocking(cmd).await;
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
}

#[test]
fn test_publish_rejects_non_object_details() {
    let dir = tempfile::tempdir().unwrap();
    leavesync_cmd()
        .arg("--config")
        .arg(dir.path().join("config.toml"))
        .args([
            "--server",
            "http://127.0.0.1:9",
            "--tenant",
            "acme",
            "publish",
            "test_signal",
            "--details",
            "[1]",
        ])
        .assert()
        .code(2);
}
