//! Integration tests for the `dashwire` CLI binary.
//!
//! Argument parsing, config handling and error exit codes run without a
//! server; the session flow runs against a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `dashwire` binary with env isolation.
///
/// Clears all `DASHWIRE_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn dashwire_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("dashwire");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("DASHWIRE_SERVER")
        .env_remove("DASHWIRE_API_BASE")
        .env_remove("DASHWIRE_OUTPUT")
        .env_remove("DASHWIRE_INSECURE")
        .env_remove("DASHWIRE_TIMEOUT")
        .env_remove("DASHWIRE_AUTH_KEY");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run a command off the async runtime so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = dashwire_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    let home = tempfile::tempdir().unwrap();
    dashwire_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("login")
            .and(predicate::str::contains("stats"))
            .and(predicate::str::contains("logs")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    dashwire_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dashwire"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    dashwire_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_interval_requires_watch() {
    let home = tempfile::tempdir().unwrap();
    dashwire_cmd(home.path())
        .args(["stats", "--interval", "10"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_is_isolated() {
    let home = tempfile::tempdir().unwrap();
    dashwire_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_set_interval_normalises_and_persists() {
    let home = tempfile::tempdir().unwrap();
    dashwire_cmd(home.path())
        .args(["config", "set-interval", "45000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("45s"));

    dashwire_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("interval_seconds = 45"));

    dashwire_cmd(home.path())
        .args(["config", "set-interval", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5s"));
}

#[test]
fn test_disable_refresh_shows_in_json() {
    let home = tempfile::tempdir().unwrap();
    dashwire_cmd(home.path())
        .args(["config", "disable"])
        .assert()
        .success();

    let output = dashwire_cmd(home.path())
        .args(["config", "show", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let shown: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["refresh"]["enabled"], json!(false));
}

#[test]
fn test_set_server_rejects_non_http() {
    let home = tempfile::tempdir().unwrap();
    dashwire_cmd(home.path())
        .args(["config", "set-server", "ftp://files.example"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("server"));
}

// ── Session errors ──────────────────────────────────────────────────

#[test]
fn test_stats_without_session_is_auth_error() {
    let home = tempfile::tempdir().unwrap();
    let output = dashwire_cmd(home.path()).arg("stats").output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    let text = combined_output(&output);
    assert!(text.contains("Not logged in"), "unexpected output:\n{text}");
}

// ── Session flow against a mock server ──────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_login_stats_status_logout() {
    let home = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({"auth_key": "k3y"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "session_id": "abc"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats"))
        .and(header("cookie", "session_id=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "memory_used": 536870912,
            "memory_total": 2147483648u64,
            "memory_percent": 25.0,
            "start_time": 1700000000
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/validate-session"))
        .and(body_json(json!({"session_id": "abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();

    let mut login = dashwire_cmd(home.path());
    login.args(["--server", &uri, "login", "--auth-key", "k3y"]);
    let output = run(login).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let mut stats = dashwire_cmd(home.path());
    stats.args(["--server", &uri, "stats", "-o", "json"]);
    let output = run(stats).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let shown: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["memory_percent"], json!(25.0));
    assert_eq!(shown["memory_total"], json!(2_147_483_648u64));

    let mut status = dashwire_cmd(home.path());
    status.args(["--server", &uri, "status", "-o", "json"]);
    let output = run(status).await;
    let shown: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["session"], json!("active"));

    let mut logout = dashwire_cmd(home.path());
    logout.args(["--server", &uri, "logout"]);
    let output = run(logout).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let mut stats = dashwire_cmd(home.path());
    stats.args(["--server", &uri, "stats"]);
    let output = run(stats).await;
    assert_eq!(output.status.code(), Some(3));
}
