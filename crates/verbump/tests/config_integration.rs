//! Configuration integration tests.
//!
//! These tests verify settings discovery, format parsing, and precedence
//! from an end-to-end perspective using the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("VERBUMP_LOG_DIR", std::env::temp_dir().join("verbump-test-logs"));
    cmd
}

const STORE: &str = "\
[bumpversion]
current_version = 0.4.1
commit = False
tag = False

[bumpversion:file:VERSION]

[bumpversion:releasenotes:CHANGES.md]
";

/// Write a store named `store_name` plus the files it tracks.
fn write_project(root: &Path, store_name: &str) {
    fs::write(root.join(store_name), STORE).unwrap();
    fs::write(root.join("VERSION"), "0.4.1\n").unwrap();
    fs::write(root.join("CHANGES.md"), "# Changes\n").unwrap();
}

fn version(root: &Path) -> String {
    fs::read_to_string(root.join("VERSION")).unwrap()
}

// =============================================================================
// Settings Discovery
// =============================================================================

#[test]
fn runs_without_settings_file() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), ".bumpversion.cfg");

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "none"])
        .assert()
        .success();
}

#[test]
fn discovers_dotfile_settings_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), "versions.cfg");
    fs::write(tmp.path().join(".verbump.toml"), r#"store_file = "versions.cfg""#).unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "none"])
        .assert()
        .success();
}

#[test]
fn discovers_regular_settings_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), "versions.cfg");
    fs::write(tmp.path().join("verbump.toml"), r#"store_file = "versions.cfg""#).unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "none"])
        .assert()
        .success();
}

#[test]
fn discovers_settings_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&sub_dir).unwrap();
    write_project(&sub_dir, "versions.cfg");
    fs::write(tmp.path().join(".verbump.toml"), r#"store_file = "versions.cfg""#).unwrap();

    cmd()
        .args(["-C", sub_dir.to_str().unwrap(), "none"])
        .assert()
        .success();
}

// =============================================================================
// Settings Formats
// =============================================================================

#[test]
fn parses_yaml_settings() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), ".bumpversion.cfg");
    fs::write(
        tmp.path().join(".verbump.yaml"),
        "log_level: debug\nrelease_notes:\n  confirm: \"yes\"\n",
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "patch"])
        .assert()
        .success();

    assert_eq!(version(tmp.path()), "0.4.2\n");
}

#[test]
fn parses_json_settings() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), ".bumpversion.cfg");
    fs::write(
        tmp.path().join(".verbump.json"),
        r#"{"release_notes": {"confirm": "yes"}}"#,
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "minor"])
        .assert()
        .success();

    assert_eq!(version(tmp.path()), "0.5.0\n");
}

// =============================================================================
// Release-Notes Policy
// =============================================================================

#[test]
fn confirm_no_refuses_and_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), ".bumpversion.cfg");
    fs::write(
        tmp.path().join(".verbump.toml"),
        "[release_notes]\nconfirm = \"no\"\n",
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "patch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not confirmed"));

    assert_eq!(version(tmp.path()), "0.4.1\n");
}

#[test]
fn yes_flag_beats_confirm_no() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), ".bumpversion.cfg");
    fs::write(
        tmp.path().join(".verbump.toml"),
        "[release_notes]\nconfirm = \"no\"\n",
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "--yes", "patch"])
        .assert()
        .success();

    assert_eq!(version(tmp.path()), "0.4.2\n");
}

// =============================================================================
// Explicit Settings File
// =============================================================================

#[test]
fn explicit_config_flag_is_used() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), "versions.cfg");
    let config_path = tmp.path().join("custom.toml");
    fs::write(&config_path, r#"store_file = "versions.cfg""#).unwrap();

    cmd()
        .args([
            "-C",
            tmp.path().to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "none",
        ])
        .assert()
        .success();
}

#[test]
fn explicit_config_overrides_discovered() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), "versions.cfg");
    fs::write(tmp.path().join(".verbump.toml"), r#"store_file = "missing.cfg""#).unwrap();
    let config_path = tmp.path().join("override.toml");
    fs::write(&config_path, r#"store_file = "versions.cfg""#).unwrap();

    cmd()
        .args([
            "-C",
            tmp.path().to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "none",
        ])
        .assert()
        .success();
}

#[test]
fn missing_explicit_config_fails() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), ".bumpversion.cfg");

    cmd()
        .args([
            "-C",
            tmp.path().to_str().unwrap(),
            "--config",
            tmp.path().join("nope.toml").to_str().unwrap(),
            "none",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn discovered_store_file_that_is_missing_fails() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), ".bumpversion.cfg");
    fs::write(tmp.path().join(".verbump.toml"), r#"store_file = "missing.cfg""#).unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "none"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.cfg"));
}

// =============================================================================
// Invalid Settings
// =============================================================================

#[test]
fn invalid_toml_fails() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), ".bumpversion.cfg");
    fs::write(tmp.path().join(".verbump.toml"), "store_file = [unterminated").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "none"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn invalid_confirm_policy_fails() {
    let tmp = TempDir::new().unwrap();
    write_project(tmp.path(), ".bumpversion.cfg");
    fs::write(
        tmp.path().join(".verbump.toml"),
        "[release_notes]\nconfirm = \"sometimes\"\n",
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "none"])
        .assert()
        .failure();
}
