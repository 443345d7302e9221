//! Error types for the API diff engine.

use std::fmt;

/// Failures surfaced by the engine.
///
/// A file that does not exist at a revision is not an error; it loads as an
/// absent snapshot instead.
#[derive(Debug, thiserror::Error)]
pub enum ApiDeltaError {
    /// The history store failed for a reason other than the path not existing.
    #[error("failed to retrieve {path} at {revision}: {message}")]
    Retrieval {
        path: String,
        revision: String,
        message: String,
    },

    /// The snapshot text is not valid Python source.
    #[error("syntax error in {path} at {revision}, line {line} column {column}: {message}")]
    Parse {
        path: String,
        revision: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// A policy value in the configuration is not recognised.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl ApiDeltaError {
    pub fn is_parse(&self) -> bool {
        matches!(self, ApiDeltaError::Parse { .. })
    }

    pub fn is_retrieval(&self) -> bool {
        matches!(self, ApiDeltaError::Retrieval { .. })
    }

    pub(crate) fn retrieval(
        path: &str,
        revision: impl fmt::Display,
        err: impl fmt::Display,
    ) -> Self {
        ApiDeltaError::Retrieval {
            path: path.to_string(),
            revision: revision.to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiDeltaError>;
