//! Integration tests for the `liveroom` CLI binary.
//!
//! Argument parsing, completions and config handling run without a
//! recorder; the room commands run against a `wiremock` recorder.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `liveroom` binary with env isolation.
///
/// Clears `LIVEROOM_*` env vars and points the config file into `dir`
/// so tests never touch the user's real configuration.
fn liveroom_cmd(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("liveroom");
    cmd.env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir)
        .env("LIVEROOM_CONFIG", dir.join("config.toml"))
        .env("NO_COLOR", "1")
        .env_remove("LIVEROOM_SERVER")
        .env_remove("LIVEROOM_OUTPUT")
        .env_remove("LIVEROOM_COLOR")
        .env_remove("LIVEROOM_TIMEOUT")
        .env_remove("LIVEROOM_PUSH_ENABLED")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn live(id: &str, nick: &str, platform: &str, recording: bool) -> serde_json::Value {
    json!({
        "id": id,
        "live_url": format!("https://live.example/{id}"),
        "platform_cn_name": platform,
        "host_name": format!("host-{id}"),
        "nick_name": nick,
        "room_name": format!("{nick}'s room"),
        "status": true,
        "listening": true,
        "recording": recording,
        "recording_preparing": false,
        "initializing": false,
        "last_error": ""
    })
}

async fn recorder() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/lives"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            live("r1", "zoe", "抖音", false),
            live("r2", "amy", "B站", true),
        ])))
        .mount(&server)
        .await;
    server
}

/// Run the binary off the runtime so the mock server keeps serving.
async fn run_blocking(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = liveroom_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let dir = tempfile::tempdir().unwrap();
    liveroom_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("live-room recorder")
            .and(predicate::str::contains("lives"))
            .and(predicate::str::contains("watch"))
            .and(predicate::str::contains("refresh")),
    );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    liveroom_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("liveroom"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    liveroom_cmd(dir.path())
        .arg("frobnicate")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_invalid_output_format() {
    let dir = tempfile::tempdir().unwrap();
    liveroom_cmd(dir.path())
        .args(["--output", "xml", "lives"])
        .assert()
        .failure()
        .code(2);
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    liveroom_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let dir = tempfile::tempdir().unwrap();
    liveroom_cmd(dir.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("liveroom"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults() {
    let dir = tempfile::tempdir().unwrap();
    liveroom_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("server = \"http://127.0.0.1:8080\"")
                .and(predicate::str::contains("push_enabled = true")),
        );
}

#[test]
fn test_config_set_persists() {
    let dir = tempfile::tempdir().unwrap();
    liveroom_cmd(dir.path())
        .args(["config", "set", "push_enabled", "false"])
        .assert()
        .success();
    liveroom_cmd(dir.path())
        .args(["config", "set", "sort.order", "descend"])
        .assert()
        .success();

    let text = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(text.contains("push_enabled = false"), "{text}");
    assert!(text.contains("order = \"descend\""), "{text}");
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let output = liveroom_cmd(dir.path())
        .args(["config", "set", "colour", "never"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("unknown config key"));
}

#[test]
fn test_config_path_honors_override() {
    let dir = tempfile::tempdir().unwrap();
    liveroom_cmd(dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

// ── Recorder commands ───────────────────────────────────────────────

#[test]
fn test_unreachable_recorder_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = liveroom_cmd(dir.path())
        .args(["--server", "http://127.0.0.1:9", "--timeout", "2", "lives"])
        .output()
        .unwrap();
    let code = output.status.code();
    assert!(
        code == Some(7) || code == Some(8),
        "expected connection or timeout exit code, got {code:?}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lives_plain_sorted_and_remembered() {
    let server = recorder().await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = liveroom_cmd(dir.path());
    cmd.args(["--server", &server.uri(), "-o", "plain", "lives", "--sort", "name"]);
    let output = run_blocking(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "r2\nr1");

    let saved = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(saved.contains("column_key = \"name\""), "{saved}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lives_tag_filter_json() {
    let server = recorder().await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = liveroom_cmd(dir.path());
    cmd.args(["--server", &server.uri(), "-o", "json-compact", "lives", "--tag", "录制中"]);
    let output = run_blocking(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));

    let rooms: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rooms = rooms.as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["id"], "r2");
    assert_eq!(rooms[0]["tags"], json!(["录制中"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_show_derives_refresh_status() {
    let server = recorder().await;
    Mock::given(method("GET"))
        .and(path("/api/lives/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r1",
            "scheduler_status": {
                "scheduler_running": true,
                "has_waiters": true,
                "seconds_until_next_request": 5.0
            },
            "rate_limit_info": {"next_request_in_sec": 12.0}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/lives/r1/logs"))
        .and(query_param("lines", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lines": ["checking", "live"],
            "total": 2,
            "max_lines": 500
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = liveroom_cmd(dir.path());
    cmd.args(["--server", &server.uri(), "show", "zoe", "-n", "2"]);
    let output = run_blocking(cmd).await;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(stdout.contains("ID:         r1"), "{stdout}");
    assert!(stdout.contains("waiting_rate_limit (next in 5s)"), "{stdout}");
    assert!(stdout.contains("  live"), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_show_unknown_room_is_not_found() {
    let server = recorder().await;
    let dir = tempfile::tempdir().unwrap();

    let mut cmd = liveroom_cmd(dir.path());
    cmd.args(["--server", &server.uri(), "show", "nobody"]);
    let output = run_blocking(cmd).await;
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("not found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_reports_room() {
    let server = recorder().await;
    let mut stopped = live("r1", "zoe", "抖音", false);
    stopped["listening"] = json!(false);
    Mock::given(method("GET"))
        .and(path("/api/lives/r1/stop"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stopped))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = liveroom_cmd(dir.path());
    cmd.args(["--server", &server.uri(), "stop", "r1"]);
    let output = run_blocking(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("zoe (r1): monitoring stopped"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_add_posts_normalized_urls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/lives"))
        .and(body_json(json!([
            {"url": "https://live.bilibili.com/493", "listen": false}
        ])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            live("r3", "kai", "B站", false)
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = liveroom_cmd(dir.path());
    cmd.args([
        "--server",
        &server.uri(),
        "-o",
        "plain",
        "add",
        "live.bilibili.com/493",
        "--no-listen",
    ]);
    let output = run_blocking(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "r3");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_add_rejected_when_nothing_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/lives"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = liveroom_cmd(dir.path());
    cmd.args(["--server", &server.uri(), "add", "https://example.invalid/x"]);
    let output = run_blocking(cmd).await;
    assert_eq!(output.status.code(), Some(6), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remove_resolves_name_and_deletes() {
    let server = recorder().await;
    Mock::given(method("DELETE"))
        .and(path("/api/lives/r2"))
        .and(body_json(json!({"delete_files": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = liveroom_cmd(dir.path());
    cmd.args(["--server", &server.uri(), "rm", "amy", "--delete-files"]);
    let output = run_blocking(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert!(
        String::from_utf8_lossy(&output.stdout).contains("amy (r2): removed with recordings"),
        "{}",
        combined_output(&output)
    );
}
