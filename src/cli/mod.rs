pub mod diff;
pub mod summary;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::snapshot::GitHistory;

/// Open the git repository at `repo` and return it with its working-tree root.
fn open_history(repo: &str) -> Result<(GitHistory, PathBuf)> {
    let repo_path = Path::new(repo);
    let history = GitHistory::discover(repo_path)?;
    let root = history
        .workdir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| repo_path.to_path_buf());
    Ok((history, root))
}
