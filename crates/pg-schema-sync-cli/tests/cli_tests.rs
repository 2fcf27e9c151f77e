//! CLI integration tests for pg-schema-sync.
//!
//! These tests verify command-line argument parsing, help output, the init
//! scaffold, and exit codes for configuration errors. Nothing here needs a
//! live database.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the pg-schema-sync binary.
fn cmd() -> Command {
    Command::cargo_bin("pg-schema-sync").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("diff"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("seed"))
        .stdout(predicate::str::contains("seed:dump"))
        .stdout(predicate::str::contains("init"));
}

#[test]
fn test_up_subcommand_help() {
    cmd()
        .args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--create"))
        .stdout(predicate::str::contains("--dry"))
        .stdout(predicate::str::contains("--drop-orphans"))
        .stdout(predicate::str::contains("--tenant"))
        .stdout(predicate::str::contains("--mute"))
        .stdout(predicate::str::contains("--display"));
}

#[test]
fn test_diff_subcommand_help() {
    cmd()
        .args(["diff", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--name"))
        .stdout(predicate::str::contains("--drop-orphans"))
        .stdout(predicate::str::contains("--display"));
}

#[test]
fn test_seed_dump_subcommand_help() {
    cmd()
        .args(["seed:dump", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--table"))
        .stdout(predicate::str::contains("--exclude"))
        .stdout(predicate::str::contains("--all"))
        .stdout(predicate::str::contains("--limit"))
        .stdout(predicate::str::contains("--skip-auto"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pg-schema-sync"));
}

// =============================================================================
// Configuration Error Tests
// =============================================================================

#[test]
fn test_missing_config_file_fails() {
    cmd()
        .args(["diff", "--config", "/nonexistent/config.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::with_suffix(".yml").unwrap();
    writeln!(file, "clusters: {{}}").unwrap();
    file.flush().unwrap();

    cmd()
        .args(["diff", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_invalid_verbosity_rejected() {
    cmd()
        .args(["diff", "--verbosity", "chatty"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("verbosity"));
}

// =============================================================================
// Init Scaffold Tests
// =============================================================================

#[test]
fn test_init_writes_samples() {
    let dir = tempfile::TempDir::new().unwrap();
    cmd()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("config.yml"));

    assert!(dir.path().join("config.yml").exists());
    assert!(dir.path().join("schema/users.yml").exists());
    assert!(dir.path().join("seed/users.yml").exists());
}

#[test]
fn test_init_does_not_overwrite() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.yml"), "custom: true\n").unwrap();

    cmd()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    let content = std::fs::read_to_string(dir.path().join("config.yml")).unwrap();
    assert_eq!(content, "custom: true\n");
}
