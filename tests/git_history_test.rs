//! GitHistory against a scratch repository built with the git command

use std::fs;
use std::path::Path;
use std::process::Command;

use apidelta::delta::ChangeType;
use apidelta::{
    ApiDeltaEngine, CompareOptions, GitHistory, HistoryStore, ModificationReason, Revision,
    SnapshotLoader,
};
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Two commits: the first adds api.py, the second changes it and adds extra.py.
fn scratch_repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    git(dir, &["init"]);
    git(dir, &["config", "user.email", "t@t.com"]);
    git(dir, &["config", "user.name", "T"]);
    git(dir, &["config", "commit.gpgsign", "false"]);

    fs::create_dir(dir.join("pkg")).unwrap();
    fs::write(
        dir.join("pkg/api.py"),
        "def connect(host):\n    \"\"\"Open a connection.\"\"\"\n\nclass Client:\n    pass\n",
    )
    .unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "initial api"]);
    git(dir, &["tag", "v1"]);

    fs::write(
        dir.join("pkg/api.py"),
        "def connect(host, port):\n    \"\"\"Open a connection.\"\"\"\n\nclass Client:\n    pass\n",
    )
    .unwrap();
    fs::write(dir.join("pkg/extra.py"), "def helper():\n    pass\n").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "add port"]);
    tmp
}

#[test]
fn test_resolve_file_at_tag() {
    let repo = scratch_repo();
    let history = GitHistory::discover(repo.path()).unwrap();

    let text = history.resolve("pkg/api.py", "v1").unwrap().unwrap();
    assert!(text.starts_with("def connect(host):"));
}

#[test]
fn test_resolve_missing_path_is_none() {
    let repo = scratch_repo();
    let history = GitHistory::discover(repo.path()).unwrap();

    assert!(history.resolve("pkg/extra.py", "v1").unwrap().is_none());
    assert!(history.resolve("nowhere/else.py", "HEAD").unwrap().is_none());
}

#[test]
fn test_resolve_unknown_revision_is_error() {
    let repo = scratch_repo();
    let history = GitHistory::discover(repo.path()).unwrap();

    let err = history.resolve("pkg/api.py", "no-such-ref").unwrap_err();
    assert!(err.to_string().contains("Unknown revision"));
}

#[test]
fn test_resolve_directory_is_error() {
    let repo = scratch_repo();
    let history = GitHistory::discover(repo.path()).unwrap();

    assert!(history.resolve("pkg", "HEAD").is_err());
}

#[test]
fn test_discover_outside_repository_fails() {
    let tmp = TempDir::new().unwrap();
    // A nested temp dir may still sit inside some repository; only assert on a clean miss.
    if let Err(e) = GitHistory::discover(tmp.path()) {
        assert!(e.to_string().contains("Not a git repository"));
    }
}

#[test]
fn test_compare_tag_against_head() {
    let repo = scratch_repo();
    let history = GitHistory::discover(repo.path()).unwrap();
    let engine = ApiDeltaEngine::new(
        SnapshotLoader::new(repo.path(), history),
        CompareOptions::default(),
    );

    let deltas = engine
        .compare_files(
            &["pkg/api.py", "pkg/extra.py"],
            &Revision::at("v1"),
            &Revision::at("HEAD"),
        )
        .unwrap();

    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas[0].changes.len(), 1);
    assert_eq!(
        deltas[0].changes[0].reason(),
        Some(ModificationReason::SignatureChanged)
    );
    assert_eq!(deltas[1].changes.len(), 1);
    assert_eq!(deltas[1].changes[0].change_type(), ChangeType::Added);
}

#[test]
fn test_compare_head_against_working_copy() {
    let repo = scratch_repo();
    fs::write(
        repo.path().join("pkg/api.py"),
        "def connect(host, port):\n    \"\"\"Open a connection.\"\"\"\n",
    )
    .unwrap();

    let history = GitHistory::discover(repo.path()).unwrap();
    let engine = ApiDeltaEngine::new(
        SnapshotLoader::new(repo.path(), history),
        CompareOptions::default(),
    );

    let delta = engine
        .compare("pkg/api.py", &Revision::at("HEAD"), &Revision::Current)
        .unwrap();
    assert_eq!(delta.changes.len(), 1);
    assert_eq!(delta.changes[0].name(), "Client");
    assert_eq!(delta.changes[0].change_type(), ChangeType::Removed);
}
