//! CLI regression tests for the `deckforge` binary.
//!
//! These tests invoke the binary as a subprocess to catch regressions in flag
//! names, exit codes and output formats.
//!
//! Run with: `cargo test -p deckforge-test`
//! Requires the `deckforge` binary to be built first (`cargo build -p deckforge`).

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::{contains, starts_with};
use serde_json::Value;
use tempfile::TempDir;

use crate::fixtures;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns an assert_cmd Command wrapping the `deckforge` binary.
fn deckforge() -> Command {
    // cargo_bin is deprecated for custom build-dir setups; fine for standard workspace use.
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("deckforge")
        .expect("deckforge binary not found; run `cargo build -p deckforge` first");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("stdout is UTF-8")
}

// ---------------------------------------------------------------------------
// deckforge compile
// ---------------------------------------------------------------------------

#[test]
fn compile_writes_yaml_to_stdout() {
    deckforge()
        .args(["compile", "--spec"])
        .arg(fixtures().join("petstore.yaml"))
        .assert()
        .success()
        .stdout(starts_with("_format_version: '3.0'"))
        .stdout(contains("pet-store_pets_listpets"));
}

#[test]
fn compile_json_output_parses() {
    let stdout = stdout_of(
        deckforge()
            .args(["compile", "--format", "json", "--spec"])
            .arg(fixtures().join("petstore.yaml")),
    );
    let doc: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(doc["_format_version"], "3.0");
    assert_eq!(doc["services"].as_array().unwrap().len(), 1);
}

#[test]
fn compile_writes_output_file() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("kong.yaml");

    deckforge()
        .args(["compile", "--spec"])
        .arg(fixtures().join("cascade.yaml"))
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout("");

    let written = std::fs::read_to_string(&output).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&written).unwrap();
    assert_eq!(doc["services"].as_sequence().unwrap().len(), 4);
    assert_eq!(doc["upstreams"].as_sequence().unwrap().len(), 1);
}

#[test]
fn compile_reads_stdin() {
    let input = std::fs::read_to_string(fixtures().join("petstore.json")).unwrap();
    deckforge()
        .args(["compile", "--spec", "-", "--format", "json"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(contains("\"pet-store_pets_listpets\""));
}

#[test]
fn compile_select_tag_overrides_document_tags() {
    let stdout = stdout_of(
        deckforge()
            .args(["compile", "--format", "json", "--select-tag", "a,b", "--spec"])
            .arg(fixtures().join("petstore.yaml")),
    );
    let doc: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(doc["services"][0]["tags"], serde_json::json!(["a", "b"]));
}

#[test]
fn compile_no_id_omits_ids() {
    deckforge()
        .args(["compile", "--no-id", "--format", "json", "--spec"])
        .arg(fixtures().join("petstore.yaml"))
        .assert()
        .success()
        .stdout(contains("\"id\"").not());
}

#[test]
fn compile_uuid_base_changes_ids() {
    let default_ids = stdout_of(
        deckforge()
            .args(["compile", "--format", "json", "--spec"])
            .arg(fixtures().join("petstore.json")),
    );
    let custom_ids = stdout_of(
        deckforge()
            .args([
                "compile",
                "--format",
                "json",
                "--uuid-base",
                "6ba7b811-9dad-11d1-80b4-00c04fd430c8",
                "--spec",
            ])
            .arg(fixtures().join("petstore.json")),
    );
    assert_ne!(default_ids, custom_ids);
}

#[test]
fn compile_invalid_uuid_base_exits_two() {
    // clap usage errors exit with 2
    deckforge()
        .args(["compile", "--uuid-base", "not-a-uuid", "--spec"])
        .arg(fixtures().join("petstore.yaml"))
        .assert()
        .failure()
        .code(2);
}

#[test]
fn compile_inso_compatible_names() {
    deckforge()
        .args(["compile", "--inso-compatible", "--spec"])
        .arg(fixtures().join("headers.yaml"))
        .assert()
        .success()
        .stdout(contains("versioned-items-getitems-1"));
}

#[test]
fn compile_security_flags() {
    deckforge()
        .args(["compile", "--generate-security", "--spec"])
        .arg(fixtures().join("security.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2006"));

    deckforge()
        .args([
            "compile",
            "--generate-security",
            "--ignore-security-errors",
            "--spec",
        ])
        .arg(fixtures().join("security.yaml"))
        .assert()
        .success()
        .stdout(contains("openid-connect"));
}

#[test]
fn compile_circular_refs_flag() {
    deckforge()
        .args(["compile", "--spec"])
        .arg(fixtures().join("circular.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E1005"));

    deckforge()
        .args(["compile", "--ignore-circular-refs", "--spec"])
        .arg(fixtures().join("circular.yaml"))
        .assert()
        .success();
}

#[test]
fn compile_missing_file_exits_one() {
    deckforge()
        .args(["compile", "--spec", "this-file-does-not-exist.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("error:"));
}

#[test]
fn compile_json_logs_go_to_stderr() {
    deckforge()
        .args([
            "--log-level",
            "debug",
            "--log-format",
            "json",
            "compile",
            "--format",
            "json",
            "--spec",
        ])
        .arg(fixtures().join("petstore.json"))
        .assert()
        .success()
        .stdout(starts_with("{"))
        .stderr(contains("\"message\":\"created route\""));
}

// ---------------------------------------------------------------------------
// deckforge validate
// ---------------------------------------------------------------------------

#[test]
fn validate_valid_spec_exits_zero() {
    deckforge()
        .args(["validate", "--spec"])
        .arg(fixtures().join("cascade.yaml"))
        .assert()
        .success()
        .stdout("")
        .stderr(contains("compiles (4 services, 5 routes)"));
}

#[test]
fn validate_invalid_spec_exits_one() {
    deckforge()
        .args(["validate", "--spec"])
        .arg(fixtures().join("invalid-missing-paths.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E1004"));
}

#[test]
fn validate_bad_server_url_exits_one() {
    deckforge()
        .args(["validate", "--spec"])
        .arg(fixtures().join("invalid-server-url.yaml"))
        .assert()
        .failure()
        .code(1)
        .stderr(contains("E2003"));
}

#[test]
fn unknown_log_format_is_rejected() {
    deckforge()
        .args(["--log-format", "xml", "validate", "--spec"])
        .arg(fixtures().join("petstore.yaml"))
        .assert()
        .failure()
        .code(2);
}
