//! Integration tests for the vcs-helper binary
//!
//! These tests verify:
//! - The default config and log directory lives outside the working copy
//! - `add` stages only the user's files in a fresh repository
//!
//! They need a real git and are skipped when it is not installed.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn git_output(cwd: &Utf8Path, args: &[&str]) -> String {
    let output = Command::new("git").args(args).current_dir(cwd).output().unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn helper(repo: &Utf8Path, home: &Utf8Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vcs-helper"));
    cmd.current_dir(repo)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"));
    cmd
}

#[cfg(unix)]
#[test]
fn test_add_in_fresh_repo_stages_only_user_files() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }

    let repo_dir = TempDir::new().unwrap();
    let repo = Utf8PathBuf::try_from(repo_dir.path().to_path_buf()).unwrap();
    let home_dir = TempDir::new().unwrap();
    let home = Utf8PathBuf::try_from(home_dir.path().to_path_buf()).unwrap();

    git_output(&repo, &["init", "-q"]);
    fs::write(repo.join("real.txt"), "hello\n").unwrap();

    let output = helper(&repo, &home)
        .args(["--no-color", "add"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "add failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let status = git_output(&repo, &["status", "--porcelain", "--untracked-files=all"]);
    assert_eq!(status, "A  real.txt\n");
    assert!(!repo.join(".vcs-helper").exists());
    assert!(home.join("config").join("vcs-helper").join("logs").is_dir());
}

#[cfg(unix)]
#[test]
fn test_explicit_config_dir_is_used() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }

    let repo_dir = TempDir::new().unwrap();
    let repo = Utf8PathBuf::try_from(repo_dir.path().to_path_buf()).unwrap();
    let home_dir = TempDir::new().unwrap();
    let home = Utf8PathBuf::try_from(home_dir.path().to_path_buf()).unwrap();
    let config_dir = home.join("elsewhere");

    git_output(&repo, &["init", "-q"]);

    let output = helper(&repo, &home)
        .args(["--no-color", "--config-dir", config_dir.as_str(), "status"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(config_dir.join("logs").is_dir());
    assert!(!home.join("config").join("vcs-helper").exists());
}
