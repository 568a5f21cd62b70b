//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own home directory so the
//! config file and database start fresh.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

const CATALOG: &str = r#"{
  "properties": [{"id": "H1", "title": "Harbour Hotel", "channel_id": "cm-h1"}],
  "room_types": [
    {"id": "R1", "property_id": "H1", "title": "Double", "room_count": 6, "channel_id": "cm-r1"}
  ],
  "rate_plans": [
    {"id": "P1", "room_type_id": "R1", "title": "Flexible", "channel_id": "cm-p1"}
  ]
}"#;

fn command(home: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_rategrid-cli"));
    cmd.args(args)
        .env("HOME", home)
        .env("RATEGRID_ENV", "production")
        .env_remove("RATEGRID_CHANNEL_API_KEY")
        .env_remove("RATEGRID_LOG");
    cmd
}

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = command(home, args)
        .output()
        .expect("Failed to execute CLI command");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn run_with_stdin(home: &Path, args: &[&str], input: &str) -> (String, String, i32) {
    let mut child = command(home, args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI command");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

fn import_catalog(home: &Path) {
    let file = home.join("catalog.json");
    std::fs::write(&file, CATALOG).unwrap();
    let (stdout, stderr, code) = run_cli(home, &["catalog", "import", file.to_str().unwrap()]);
    assert_eq!(code, 0, "catalog import failed: {stderr}");
    assert!(stdout.contains("imported 1 property(ies), 1 room type(s), 1 rate plan(s)"));
}

#[test]
fn test_help() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["--help"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("session"));
    assert!(stdout.contains("grid"));
}

#[test]
fn test_invalid_command() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["no-such-command"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_defaults() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("config.toml"));

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "commit.batch_size"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "10");
}

#[test]
fn test_config_set_persists() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(home.path(), &["config", "set", "commit.batch_size", "3"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "commit.batch_size"]);
    assert_eq!(stdout.trim(), "3");

    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "commit.batch_size", "0"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));
}

#[test]
fn test_unknown_property_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(
        home.path(),
        &["grid", "show", "--property", "H9", "--from", "2024-06-01", "--to", "2024-06-02"],
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_grid_show_json() {
    let home = tempfile::tempdir().unwrap();
    import_catalog(home.path());

    let (stdout, stderr, code) = run_cli(
        home.path(),
        &[
            "grid", "show", "--property", "H1", "--from", "2024-06-01", "--to", "2024-06-03",
            "--json",
        ],
    );
    assert_eq!(code, 0, "grid show failed: {stderr}");
    let grid: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(grid["dates"].as_array().unwrap().len(), 3);
    assert_eq!(grid["room_types"][0]["availability"][0]["record_id"], 0);
}

#[test]
fn test_session_save() {
    let home = tempfile::tempdir().unwrap();
    import_catalog(home.path());

    let (stdout, stderr, code) = run_with_stdin(
        home.path(),
        &["session", "--property", "H1", "--from", "2024-06-01", "--to", "2024-06-03"],
        "set availability R1 2024-06-02 5\nset availability R1 2024-06-03 40\nsave\nstatus\nquit\n",
    );
    assert_eq!(code, 0, "session failed: {stderr}");
    assert!(stdout.contains("saved 1 change(s)"));
    assert!(stdout.contains("availability R1: dirty"));
    // out-of-range input is reported and the session continues
    assert!(stderr.contains("error:"));

    let (stdout, _, _) = run_cli(
        home.path(),
        &[
            "grid", "show", "--property", "H1", "--from", "2024-06-02", "--to", "2024-06-02",
            "--json",
        ],
    );
    let grid: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(grid["room_types"][0]["availability"][0]["value"], 5);
}
