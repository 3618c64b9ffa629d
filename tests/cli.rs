use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const DOCFX: &str = r#"{"build": {
    "content": [{"src": "."}],
    "globalMetadata": {"breadcrumb_path": "/visualstudio/_breadcrumb/toc.json"}
}}"#;

fn cmd(cwd: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_docsweep")));
    cmd.current_dir(cwd).env("NO_COLOR", "1");
    cmd
}

fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn orphaned_topics_lists_topic_missing_from_toc() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    write(&docs, "docfx.json", DOCFX);
    write(&docs, "toc.md", "# [Topic](topic1.md)\n");
    write(&docs, "topic1.md", "# Topic 1\n");
    let topic2 = write(&docs, "topic2.md", "# Topic 2\n");

    cmd(dir.path())
        .args(["orphaned-topics", "docs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("topic2.md"))
        .stdout(predicate::str::contains("topic1.md").not());
    assert!(topic2.exists());
}

#[test]
fn orphaned_topics_delete_removes_unlinked_topic() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    write(&docs, "docfx.json", DOCFX);
    write(&docs, "toc.md", "# [Topic](topic1.md)\n");
    let topic1 = write(&docs, "topic1.md", "# Topic 1\n");
    let topic2 = write(&docs, "topic2.md", "# Topic 2\n");

    cmd(dir.path())
        .args(["orphaned-topics", "docs", "--delete"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted"));
    assert!(topic1.exists());
    assert!(!topic2.exists());
}

#[test]
fn orphaned_images_json() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    write(&docs, "docfx.json", DOCFX);
    write(&docs, "ide/media/used.png", "");
    write(&docs, "ide/media/unused.png", "");
    write(&docs, "ide/article.md", "![a](media/used.png)\n");

    let assert = cmd(dir.path())
        .args(["--json", "orphaned-images", "docs"])
        .assert()
        .success();
    let output: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(output["kind"], "images");
    assert_eq!(output["targets"], 2);
    let orphans = output["orphans"].as_array().unwrap();
    assert_eq!(orphans.len(), 1);
    assert!(orphans[0].as_str().unwrap().ends_with("unused.png"));
}

#[test]
fn orphaned_images_top_level_only() {
    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    write(&docs, "docfx.json", DOCFX);
    write(&docs, "ide/media/x.png", "");
    write(&docs, "ide/media/old/x.png", "");

    let assert = cmd(dir.path())
        .args(["--json", "orphaned-images", "docs/ide/media", "--recursive", "false"])
        .assert()
        .success();
    let output: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(output["targets"], 1);
    let orphans = output["orphans"].as_array().unwrap();
    assert_eq!(orphans.len(), 1);
    assert!(orphans[0].as_str().unwrap().ends_with("media/x.png"));
}

#[test]
fn clean_redirects_dry_run_leaves_manifest() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "docs/docfx.json", DOCFX);
    let manifest = r#"{"redirections": [
        {"source_path": "docs/old.md", "redirect_url": "/visualstudio/middle"},
        {"source_path": "docs/middle.md", "redirect_url": "/visualstudio/new"}
    ]}"#;
    let path = write(dir.path(), ".openpublishing.redirection.json", manifest);

    cmd(dir.path())
        .args(["clean-redirects", "docs", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"))
        .stdout(predicate::str::contains("/visualstudio/new"));
    assert_eq!(fs::read_to_string(&path).unwrap(), manifest);

    cmd(dir.path())
        .args(["clean-redirects", "docs"])
        .assert()
        .success();
    assert!(!fs::read_to_string(&path).unwrap().contains("/visualstudio/middle"));
}

#[test]
fn missing_directory_fails() {
    let dir = TempDir::new().unwrap();

    cmd(dir.path())
        .args(["orphaned-images", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn verbose_and_quiet_conflict() {
    let dir = TempDir::new().unwrap();

    cmd(dir.path())
        .args(["-q", "-v", "multiples", "."])
        .assert()
        .failure();
}
