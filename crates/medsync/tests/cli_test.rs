//! Integration tests for the `medsync` CLI binary.
//!
//! Argument parsing, help output, and completions need no server. The
//! data commands run against an unreachable address (offline path) or a
//! wiremock server, always with a throwaway cache directory.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Nothing listens on the discard port, so connections are refused.
const UNREACHABLE: &str = "http://127.0.0.1:9";

/// Build a [`Command`] for the `medsync` binary with env isolation.
///
/// Clears all `MEDSYNC_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn medsync_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("medsync");
    cmd.env("HOME", "/tmp/medsync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/medsync-cli-test-nonexistent")
        .env("XDG_CACHE_HOME", "/tmp/medsync-cli-test-nonexistent")
        .env_remove("MEDSYNC_PROFILE")
        .env_remove("MEDSYNC_API_URL")
        .env_remove("MEDSYNC_WS_URL")
        .env_remove("MEDSYNC_TOKEN")
        .env_remove("MEDSYNC_CACHE_DIR")
        .env_remove("MEDSYNC_OUTPUT")
        .env_remove("MEDSYNC_INSECURE")
        .env_remove("MEDSYNC_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// A command aimed at `api_url` with its own cache. The token env var
/// keeps credential resolution away from the system keyring.
fn data_cmd(api_url: &str, cache: &Path) -> assert_cmd::Command {
    let mut cmd = medsync_cmd();
    cmd.env("MEDSYNC_TOKEN", "test-token")
        .arg("--api-url")
        .arg(api_url)
        .arg("--cache-dir")
        .arg(cache)
        .args(["--timeout", "5", "--color", "never"]);
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = medsync_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    medsync_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("RFID")
            .and(predicate::str::contains("cards"))
            .and(predicate::str::contains("patients"))
            .and(predicate::str::contains("reader")),
    );
}

#[test]
fn test_version_flag() {
    medsync_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("medsync"));
}

#[test]
fn test_cards_subcommands_exist() {
    medsync_cmd()
        .args(["cards", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("register")
                .and(predicate::str::contains("link"))
                .and(predicate::str::contains("unlink"))
                .and(predicate::str::contains("remove")),
        );
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    medsync_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    medsync_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_output_format() {
    let output = medsync_cmd()
        .args(["--output", "invalid", "cards", "list"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_unknown_profile_is_not_found() {
    let output = medsync_cmd()
        .args(["--profile", "nowhere", "cards", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("nowhere"));
}

#[test]
fn test_remove_without_yes_is_refused_off_tty() {
    let cache = tempfile::tempdir().unwrap();
    let output = data_cmd(UNREACHABLE, cache.path())
        .args(["cards", "remove", "04A1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    // Falls back to the built-in defaults when no file exists.
    medsync_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_init_then_path_and_show() {
    let home = tempfile::tempdir().unwrap();
    let run = |args: &[&str]| {
        let mut cmd = medsync_cmd();
        cmd.env("HOME", home.path())
            .env("XDG_CONFIG_HOME", home.path())
            .args(args);
        cmd
    };

    run(&[
        "--profile",
        "clinic",
        "--api-url",
        "http://10.0.0.5:8001",
        "config",
        "init",
        "--email",
        "nurse@example.org",
    ])
    .assert()
    .success();

    run(&["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(home.path().to_string_lossy().as_ref()));

    run(&["config", "show"]).assert().success().stdout(
        predicate::str::contains("[profiles.clinic]")
            .and(predicate::str::contains("http://10.0.0.5:8001"))
            .and(predicate::str::contains("default_profile = \"clinic\"")),
    );
}

// ── Offline writes ──────────────────────────────────────────────────

#[test]
fn test_offline_register_is_kept_and_listed() {
    let cache = tempfile::tempdir().unwrap();

    data_cmd(UNREACHABLE, cache.path())
        .args(["cards", "register", "04A1", "Ward key"])
        .assert()
        .success()
        .stderr(predicate::str::contains("pending sync"));

    data_cmd(UNREACHABLE, cache.path())
        .args(["-o", "json", "cards", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"uid\": \"04A1\"")
                .and(predicate::str::contains("\"pending_sync\": true")),
        )
        .stderr(predicate::str::contains("offline"));
}

#[test]
fn test_offline_duplicate_register_fails() {
    let cache = tempfile::tempdir().unwrap();

    data_cmd(UNREACHABLE, cache.path())
        .args(["cards", "register", "04A1", "Ward key"])
        .assert()
        .success();

    let output = data_cmd(UNREACHABLE, cache.path())
        .args(["cards", "register", "04A1", "Other"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_scans_need_the_server() {
    let cache = tempfile::tempdir().unwrap();
    let output = data_cmd(UNREACHABLE, cache.path())
        .arg("scans")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
}

// ── Against a server ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_cards_list_from_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/rfid/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cards": [{
                "uid": "04A1",
                "label": "Ward key",
                "patient_id": "p-1",
                "patient_name": "Ada Lovelace",
                "registered_at": "2026-03-01T09:15:00",
                "last_scanned": null,
                "is_active": 1
            }]
        })))
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let uri = server.uri();
    let cache_path = cache.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        data_cmd(&uri, &cache_path)
            .args(["-o", "plain", "cards", "list"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "04A1");
    assert!(!String::from_utf8_lossy(&output.stderr).contains("offline"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_renders_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "timestamp": "2026-03-01T09:15:00",
            "websocket_clients": 2,
            "serial_connected": true
        })))
        .mount(&server)
        .await;

    let cache = tempfile::tempdir().unwrap();
    let uri = server.uri();
    let cache_path = cache.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        data_cmd(&uri, &cache_path).arg("health").output().unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Status:            ok"));
    assert!(stdout.contains("Realtime clients:  2"));
}

/// Run `args` against `server` on a blocking thread.
async fn run_against(server: &MockServer, args: &'static [&'static str]) -> std::process::Output {
    let cache = tempfile::tempdir().unwrap();
    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let output = data_cmd(&uri, cache.path()).args(args).output().unwrap();
        drop(cache);
        output
    })
    .await
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_prescription_create_prints_barcode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/prescriptions"))
        .and(body_json(json!({
            "patientId": "p-1",
            "medication": "Amoxicillin",
            "dosage": "500mg",
            "frequency": "3x daily",
            "dateExpires": null,
            "notes": null
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "rx-9",
            "barcode": "RX-1A2B3C4D5E6F7A8B",
            "message": "Prescription created successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_against(
        &server,
        &[
            "-o", "plain", "prescriptions", "create", "--patient", "p-1", "-m", "Amoxicillin",
            "-d", "500mg", "-f", "3x daily",
        ],
    )
    .await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "RX-1A2B3C4D5E6F7A8B"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_prescription_verify_refused_for_non_pharmacist() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/prescriptions/RX-ABC/verify"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "Only pharmacists can verify prescriptions"
        })))
        .mount(&server)
        .await;

    let output = run_against(&server, &["prescriptions", "verify", "RX-ABC"]).await;

    assert_eq!(output.status.code(), Some(5));
    assert!(combined_output(&output).contains("Only pharmacists"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_prescription_verify_unknown_barcode_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/prescriptions/RX-NOPE/verify"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Prescription not found" })),
        )
        .mount(&server)
        .await;

    let output = run_against(&server, &["prescriptions", "verify", "RX-NOPE"]).await;
    assert_eq!(output.status.code(), Some(4));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_patient_show_by_card_uid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/patients/04A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "p-1",
            "name": "Ada Lovelace",
            "rfid_uid": "04A1",
            "created_at": "2026-03-01T09:00:00",
            "updated_at": "2026-03-01T09:00:00",
            "prescriptions": [{
                "id": "rx-1",
                "patient_id": "p-1",
                "doctor_id": "d-1",
                "medication": "Amoxicillin",
                "dosage": "500mg",
                "frequency": "3x daily",
                "date_issued": "2026-03-01T09:20:00",
                "status": "active"
            }]
        })))
        .mount(&server)
        .await;

    let output = run_against(&server, &["patients", "show", "04A1"]).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Name:      Ada Lovelace"));
    assert!(stdout.contains("Amoxicillin 500mg, 3x daily [active]"));
}
