//! End-to-end tests of the `ng` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

fn ng(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ng").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("NOTEGRAPH_CONFIG")
        .env_remove("NOTEGRAPH_HOME")
        .env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let dir = tempdir().unwrap();
    ng(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized knowledge base"));
    dir
}

#[test]
fn test_init_twice_requires_force() {
    let dir = initialized();
    assert!(dir.path().join(".notegraph/config.toml").exists());

    ng(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    ng(&dir).args(["init", "--force"]).assert().success();
}

#[test]
fn test_write_then_read() {
    let dir = initialized();

    ng(&dir)
        .args(["write", "-e", "Coffee Brewing", "- [method] Pour over #coffee\\n- pairs_with [[Croissant]]"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created"))
        .stdout(predicate::str::contains("coffee-brewing"));

    assert!(dir.path().join("coffee-brewing.md").exists());

    ng(&dir)
        .args(["read", "Coffee Brewing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("permalink: coffee-brewing"))
        .stdout(predicate::str::contains("- pairs_with [[Croissant]]"));
}

#[test]
fn test_write_keeps_backslash_n_without_escapes() {
    let dir = initialized();

    ng(&dir)
        .args(["write", "Paths", "Use C:\\new\\notes for drafts"])
        .assert()
        .success();

    let text = std::fs::read_to_string(dir.path().join("paths.md")).unwrap();
    assert!(text.contains("Use C:\\new\\notes for drafts"));
}

#[test]
fn test_search_json() {
    let dir = initialized();
    ng(&dir)
        .args(["write", "Coffee Brewing", "- [method] Pour over #coffee"])
        .assert()
        .success();
    ng(&dir)
        .args(["write", "Tea", "Green and black."])
        .assert()
        .success();

    let output = ng(&dir)
        .args(["search", "coffee", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let hits: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["permalink"], "coffee-brewing");
}

#[test]
fn test_context_follows_relations() {
    let dir = initialized();
    ng(&dir)
        .args(["write", "Coffee Brewing", "- pairs_with [[Croissant]]"])
        .assert()
        .success();
    ng(&dir)
        .args(["write", "Croissant", "Flaky."])
        .assert()
        .success();

    ng(&dir)
        .args(["context", "Coffee Brewing", "--depth", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pairs_with"))
        .stdout(predicate::str::contains("Croissant"))
        .stdout(predicate::str::contains("1 related note(s)"));
}

#[test]
fn test_unknown_note_fails() {
    let dir = initialized();
    ng(&dir)
        .args(["read", "Nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nowhere"));
}

#[test]
fn test_delete_and_rebuild_verify() {
    let dir = initialized();
    ng(&dir)
        .args(["write", "Scratch", "Temporary."])
        .assert()
        .success();

    ng(&dir)
        .args(["delete", "Scratch"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted"));
    assert!(!dir.path().join("scratch.md").exists());

    ng(&dir)
        .args(["rebuild", "--verify"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Consistency check passed"));
}

#[test]
fn test_ls_lists_folder() {
    let dir = initialized();
    ng(&dir)
        .args(["write", "Coffee Brewing", "Beans.", "--folder", "food"])
        .assert()
        .success();

    ng(&dir)
        .args(["ls", "food"])
        .assert()
        .success()
        .stdout(predicate::str::contains("coffee-brewing.md"))
        .stdout(predicate::str::contains("Coffee Brewing"));
}
