//! The comparison pipeline: load both snapshots, extract, diff.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::delta::{diff_with, ChangeRecord, Granularity};
use crate::error::{ApiDeltaError, Result};
use crate::extractor::{extract, StructuralSummary};
use crate::snapshot::{HistoryStore, Revision, Snapshot, SnapshotLoader};

/// What a parse failure on either side of a comparison does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseErrorPolicy {
    /// Fail the whole comparison.
    #[default]
    Abort,
    /// Treat the unparsable side as having no declarations.
    TreatAsEmpty,
}

impl ParseErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseErrorPolicy::Abort => "abort",
            ParseErrorPolicy::TreatAsEmpty => "treat_as_empty",
        }
    }
}

impl FromStr for ParseErrorPolicy {
    type Err = ApiDeltaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "abort" => Ok(ParseErrorPolicy::Abort),
            "treat_as_empty" => Ok(ParseErrorPolicy::TreatAsEmpty),
            other => Err(ApiDeltaError::Configuration(format!(
                "on_parse_error = \"{}\" (expected abort or treat_as_empty)",
                other
            ))),
        }
    }
}

impl fmt::Display for ParseErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareOptions {
    pub on_parse_error: ParseErrorPolicy,
    pub granularity: Granularity,
}

/// All change records for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDelta {
    pub path: String,
    pub changes: Vec<ChangeRecord>,
}

impl FileDelta {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

pub struct ApiDeltaEngine<H> {
    loader: SnapshotLoader<H>,
    options: CompareOptions,
}

impl<H: HistoryStore> ApiDeltaEngine<H> {
    pub fn new(loader: SnapshotLoader<H>, options: CompareOptions) -> Self {
        Self { loader, options }
    }

    /// Structural summary of `path` at `revision`, honouring the parse policy.
    pub fn summarize(&self, path: &str, revision: &Revision) -> Result<StructuralSummary> {
        let snapshot = self.loader.load(path, revision)?;
        self.extract_with_policy(&snapshot)
    }

    /// Compare one file between `base` and `head`.
    ///
    /// Any error aborts the comparison; no partial record set is returned.
    pub fn compare(&self, path: &str, base: &Revision, head: &Revision) -> Result<FileDelta> {
        let old_snapshot = self.loader.load(path, base)?;
        let new_snapshot = self.loader.load(path, head)?;

        if old_snapshot.is_absent() && new_snapshot.is_absent() {
            info!("{} exists at neither {} nor {}", path, base, head);
        } else if old_snapshot.is_absent() {
            info!("File added: {}", path);
        } else if new_snapshot.is_absent() {
            info!("File removed: {}", path);
        } else {
            debug!("File present at both revisions: {}", path);
        }

        let old = self.extract_with_policy(&old_snapshot)?;
        let new = self.extract_with_policy(&new_snapshot)?;
        let changes = diff_with(&old, &new, self.options.granularity);

        info!(
            "{}: {} declaration(s) before, {} after, {} change(s)",
            path,
            old.len(),
            new.len(),
            changes.len()
        );

        Ok(FileDelta {
            path: path.to_string(),
            changes,
        })
    }

    /// Compare several files, failing fast on the first error.
    pub fn compare_files<S: AsRef<str>>(
        &self,
        paths: &[S],
        base: &Revision,
        head: &Revision,
    ) -> Result<Vec<FileDelta>> {
        info!("Analyzing {} file(s) between {} and {}", paths.len(), base, head);
        paths
            .iter()
            .map(|path| self.compare(path.as_ref(), base, head))
            .collect()
    }

    fn extract_with_policy(&self, snapshot: &Snapshot) -> Result<StructuralSummary> {
        match extract(snapshot) {
            Ok(summary) => Ok(summary),
            Err(e) if e.is_parse() && self.options.on_parse_error == ParseErrorPolicy::TreatAsEmpty => {
                warn!("{}; treating as no declarations", e);
                Ok(StructuralSummary::new())
            }
            Err(e) => Err(e),
        }
    }
}
