//! Integration tests for the command-line interface

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_bdmv-patcher");

fn run(args: &[&str]) -> Output {
    Command::new(BIN).args(args).output().unwrap()
}

/// Helper to create a disc root with one stripped index.bdmv
fn setup_disc() -> TempDir {
    let dir = TempDir::new().unwrap();
    let bdmv = dir.path().join("BDMV");
    fs::create_dir_all(&bdmv).unwrap();
    let mut data = vec![0x30u8; 96];
    data[12..16].fill(0);
    fs::write(bdmv.join("index.bdmv"), data).unwrap();
    dir
}

fn index_len(disc: &Path) -> usize {
    fs::read(disc.join("BDMV").join("index.bdmv")).unwrap().len()
}

#[test]
fn test_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Modify BDMV backups"));
    assert!(stdout.contains("--dry-run"));
}

#[test]
fn test_requires_directory() {
    let output = run(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_patch_and_summary() {
    let disc = setup_disc();
    let output = run(&[disc.path().to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("patched (120 bytes)"));
    assert_eq!(index_len(disc.path()), 120);
    assert!(disc.path().join("BDMV/BACKUP/index.bdmv").is_file());
}

#[test]
fn test_second_run_reports_already_patched() {
    let disc = setup_disc();
    let root = disc.path().to_str().unwrap();
    run(&[root]);

    let output = run(&[root]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("already patched"));
    assert_eq!(index_len(disc.path()), 120);
}

#[test]
fn test_dry_run() {
    let disc = setup_disc();
    let output = run(&["--dry-run", disc.path().to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("would patch"));
    assert_eq!(index_len(disc.path()), 96);
    assert!(!disc.path().join("BDMV/BACKUP").exists());
}

#[test]
fn test_verbose_logs_carry_source() {
    let disc = setup_disc();
    let root = disc.path().to_str().unwrap();
    let output = run(&["-v", root]);

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("source="));
    assert!(stderr.contains(root));
    assert!(stderr.contains("copying index to backup"));
}

#[test]
fn test_missing_index_sets_exit_status() {
    let disc = TempDir::new().unwrap();
    fs::create_dir_all(disc.path().join("BDMV")).unwrap();

    let output = run(&[disc.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No index.bdmv file found"));
}

#[test]
fn test_other_roots_processed_after_failure() {
    let disc = setup_disc();
    let missing = disc.path().join("missing");

    let output = run(&[missing.to_str().unwrap(), disc.path().to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(index_len(disc.path()), 120);
}

#[test]
fn test_invalid_config_rejected() {
    let disc = setup_disc();
    let config = disc.path().join("patcher.toml");
    fs::write(&config, "[patcher]\nreport = \"sometimes\"\n").unwrap();

    let output = run(&["--config", config.to_str().unwrap(), disc.path().to_str().unwrap()]);
    assert!(!output.status.success());
    assert_eq!(index_len(disc.path()), 96);
}
