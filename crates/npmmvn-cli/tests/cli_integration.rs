//! Integration tests for the npmmvn binary.
//!
//! Only exercises paths that fail before any network access.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn npmmvn(project: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_npmmvn"))
        .arg("-C")
        .arg(project)
        .args(args)
        .env_remove("NPMMVN_REPOSITORY")
        .env("HOME", project)
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run npmmvn")
}

#[test]
fn test_unknown_command_is_rejected() {
    let temp = TempDir::new().unwrap();
    let output = npmmvn(temp.path(), &["publish"]);
    assert!(!output.status.success());
    assert!(!temp.path().join(".npmmvn.json").exists());
}

#[test]
fn test_deploy_without_package_json_fails() {
    let temp = TempDir::new().unwrap();
    let output = npmmvn(temp.path(), &["deploy"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr was: {}", stderr);
}

#[test]
fn test_deploy_without_repository_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("package.json"),
        r#"{"name": "app", "version": "1.0.0"}"#,
    )
    .unwrap();

    let output = npmmvn(temp.path(), &["deploy"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("repository"), "stderr was: {}", stderr);
    assert!(!temp.path().join(".npmmvn.json").exists());
}

#[test]
fn test_restore_without_manifest_fails() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("package.json"),
        r#"{"name": "app", "version": "1.0.0", "mavenRepository": "http://127.0.0.1:9/repo/"}"#,
    )
    .unwrap();

    let output = npmmvn(temp.path(), &["restore"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Done."));
}

#[test]
fn test_restore_empty_manifest_is_nothing_to_do() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("package.json"),
        r#"{"name": "app", "version": "1.0.0", "mavenRepository": "http://127.0.0.1:9/repo/"}"#,
    )
    .unwrap();
    std::fs::write(temp.path().join(".npmmvn.json"), "[]").unwrap();

    let output = npmmvn(temp.path(), &["restore"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Nothing to do."), "stdout was: {}", stdout);
}
