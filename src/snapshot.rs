//! Snapshot loading: the text of one file at one revision.
//!
//! Historical content comes from a [`HistoryStore`]. The working copy is read
//! straight from disk. A path that does not exist at a revision yields an
//! absent [`Snapshot`]; any other failure is a retrieval error.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context};
use git2::{ErrorCode, Repository};
use tracing::debug;

use crate::error::{ApiDeltaError, Result};

/// Where to read a file from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// The live working copy.
    Current,
    /// Any reference the history store understands (SHA, branch, tag, `HEAD~1`).
    At(String),
}

impl Revision {
    pub fn at(reference: impl Into<String>) -> Self {
        Revision::At(reference.into())
    }

    /// Abbreviated form used in report headings.
    pub fn short(&self, len: usize) -> String {
        match self {
            Revision::Current => "current".to_string(),
            Revision::At(reference) => reference.chars().take(len.max(1)).collect(),
        }
    }
}

impl FromStr for Revision {
    type Err = ApiDeltaError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ApiDeltaError::Configuration(
                "revision must not be empty".to_string(),
            ));
        }
        if trimmed.eq_ignore_ascii_case("current") {
            Ok(Revision::Current)
        } else {
            Ok(Revision::At(trimmed.to_string()))
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Current => write!(f, "current"),
            Revision::At(reference) => write!(f, "{}", reference),
        }
    }
}

/// The text of one file at one revision, or the fact that it did not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    path: String,
    revision: Revision,
    content: Option<String>,
}

impl Snapshot {
    pub fn present(path: impl Into<String>, revision: Revision, content: String) -> Self {
        Self {
            path: path.into(),
            revision,
            content: Some(content),
        }
    }

    pub fn absent(path: impl Into<String>, revision: Revision) -> Self {
        Self {
            path: path.into(),
            revision,
            content: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn is_absent(&self) -> bool {
        self.content.is_none()
    }
}

/// Historical file content, keyed by path and revision.
///
/// `Ok(None)` means the path does not exist at that revision. `Err` is
/// reserved for everything else (unknown revision, unreadable object).
pub trait HistoryStore {
    fn resolve(&self, path: &str, revision: &str) -> anyhow::Result<Option<String>>;
}

impl<H: HistoryStore + ?Sized> HistoryStore for &H {
    fn resolve(&self, path: &str, revision: &str) -> anyhow::Result<Option<String>> {
        (**self).resolve(path, revision)
    }
}

/// History backed by a local git repository.
pub struct GitHistory {
    repo: Repository,
}

impl GitHistory {
    /// Open the repository containing `path`.
    pub fn discover(path: &Path) -> anyhow::Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("Not a git repository: {}", path.display()))?;
        Ok(Self { repo })
    }

    /// Root of the working tree, if the repository is not bare.
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }
}

impl HistoryStore for GitHistory {
    fn resolve(&self, path: &str, revision: &str) -> anyhow::Result<Option<String>> {
        let object = self
            .repo
            .revparse_single(revision)
            .with_context(|| format!("Unknown revision: {}", revision))?;
        let commit = object
            .peel_to_commit()
            .with_context(|| format!("{} does not name a commit", revision))?;
        let tree = commit.tree()?;

        let entry = match tree.get_path(Path::new(&normalize_path(path))) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let blob = match entry.to_object(&self.repo)?.into_blob() {
            Ok(blob) => blob,
            Err(_) => bail!("{} is not a regular file at {}", path, revision),
        };
        let text = String::from_utf8(blob.content().to_vec())
            .with_context(|| format!("{} at {} is not valid UTF-8", path, revision))?;
        Ok(Some(text))
    }
}

/// In-memory history, for tests and for callers that already hold the text.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    files: HashMap<(String, String), String>,
    broken: HashSet<String>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(
        mut self,
        revision: impl Into<String>,
        path: impl AsRef<str>,
        content: impl Into<String>,
    ) -> Self {
        self.files
            .insert((revision.into(), normalize_path(path.as_ref())), content.into());
        self
    }

    /// Every lookup at `revision` fails, as if the store were unreachable.
    pub fn with_broken_revision(mut self, revision: impl Into<String>) -> Self {
        self.broken.insert(revision.into());
        self
    }
}

impl HistoryStore for MemoryHistory {
    fn resolve(&self, path: &str, revision: &str) -> anyhow::Result<Option<String>> {
        if self.broken.contains(revision) {
            bail!("history store unavailable for {}", revision);
        }
        Ok(self
            .files
            .get(&(revision.to_string(), normalize_path(path)))
            .cloned())
    }
}

/// Loads snapshots from the working tree at `root` or from `history`.
pub struct SnapshotLoader<H> {
    root: PathBuf,
    history: H,
}

impl<H: HistoryStore> SnapshotLoader<H> {
    pub fn new(root: impl Into<PathBuf>, history: H) -> Self {
        Self {
            root: root.into(),
            history,
        }
    }

    pub fn load(&self, path: &str, revision: &Revision) -> Result<Snapshot> {
        let content = match revision {
            Revision::Current => self.read_working_copy(path)?,
            Revision::At(reference) => self
                .history
                .resolve(path, reference)
                .map_err(|e| ApiDeltaError::retrieval(path, reference, format!("{:#}", e)))?,
        };

        match content {
            Some(text) => Ok(Snapshot::present(path, revision.clone(), text)),
            None => {
                debug!("{} does not exist at {}", path, revision);
                Ok(Snapshot::absent(path, revision.clone()))
            }
        }
    }

    fn read_working_copy(&self, path: &str) -> Result<Option<String>> {
        let full_path = self.root.join(normalize_path(path));
        match fs::read_to_string(&full_path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ApiDeltaError::retrieval(path, Revision::Current, e)),
        }
    }
}

/// Repository-relative form with forward slashes and no leading `./`.
fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.to_string()
}
