//! apidelta - Diff the public API surface of Python source files
//!
//! Loads a file at two revisions (working copy or git history), extracts its
//! top-level functions and classes with tree-sitter, and classifies what was
//! added, removed or modified. The resulting change records feed issue,
//! README or documentation tooling as Markdown or JSON.

pub mod cli;
pub mod config;
pub mod delta;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod report;
pub mod snapshot;
mod validity;

pub use delta::{diff, diff_with, ChangeRecord, Granularity, ModificationReason, Notification};
pub use engine::{ApiDeltaEngine, CompareOptions, FileDelta, ParseErrorPolicy};
pub use error::{ApiDeltaError, Result};
pub use extractor::{extract, Declaration, DeclarationKind, StructuralSummary};
pub use snapshot::{GitHistory, HistoryStore, MemoryHistory, Revision, Snapshot, SnapshotLoader};
