//! Integration tests for the `facenet-finetune` command line.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn bin() -> Command {
    Command::cargo_bin("facenet-finetune").unwrap()
}

#[test]
fn test_help_lists_snake_case_flags() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--inputs_path"))
        .stdout(predicate::str::contains("--iterations_per_epoch"))
        .stdout(predicate::str::contains("--freeze_backbone"));
}

#[test]
fn test_unknown_flag_is_a_usage_error() {
    bin()
        .arg("--learning-rate")
        .arg("0.1")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unexpected argument"));
}

#[test]
fn test_non_numeric_batch_size_fails() {
    bin()
        .args(["--batch_size", "abc"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--batch_size"));
}

#[test]
fn test_zero_batch_size_is_rejected_before_any_work() {
    let temp_dir = TempDir::new().unwrap();

    bin()
        .current_dir(temp_dir.path())
        .args(["--batch_size", "0", "--backend", "ndarray"])
        .args(["--exps_dir", "myrun"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("batch_size must be greater than 0"));

    assert!(!temp_dir.path().join("myrun").exists());
    assert!(temp_dir.path().join("log.log").exists());
}

#[test]
fn test_log_file_directory_is_not_created() {
    let temp_dir = TempDir::new().unwrap();

    bin()
        .current_dir(temp_dir.path())
        .args(["--log_file", "missing/run.log"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot open log file"));

    assert!(!temp_dir.path().join("missing").exists());
}
