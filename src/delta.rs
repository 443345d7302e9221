//! Classifying the differences between two structural summaries.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ApiDeltaError, Result};
use crate::extractor::{Declaration, StructuralSummary};

/// Which attributes take part in a comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Only additions and removals.
    Names,
    /// Also kind and signature changes.
    Signatures,
    /// Also documentation changes.
    #[default]
    Full,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Names => "names",
            Granularity::Signatures => "signatures",
            Granularity::Full => "full",
        }
    }
}

impl FromStr for Granularity {
    type Err = ApiDeltaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "names" => Ok(Granularity::Names),
            "signatures" => Ok(Granularity::Signatures),
            "full" => Ok(Granularity::Full),
            other => Err(ApiDeltaError::Configuration(format!(
                "granularity = \"{}\" (expected names, signatures or full)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModificationReason {
    KindChanged,
    SignatureChanged,
    DocumentationChanged,
}

impl ModificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModificationReason::KindChanged => "kind-changed",
            ModificationReason::SignatureChanged => "signature-changed",
            ModificationReason::DocumentationChanged => "documentation-changed",
        }
    }
}

impl fmt::Display for ModificationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified difference for a single declaration name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    Added {
        name: String,
        declaration: Declaration,
    },
    Removed {
        name: String,
        declaration: Declaration,
    },
    Modified {
        name: String,
        old: Declaration,
        new: Declaration,
        reason: ModificationReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

/// The flat form handed to notification collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub name: String,
    pub detail: String,
}

impl ChangeRecord {
    pub fn name(&self) -> &str {
        match self {
            ChangeRecord::Added { name, .. }
            | ChangeRecord::Removed { name, .. }
            | ChangeRecord::Modified { name, .. } => name,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            ChangeRecord::Added { .. } => ChangeType::Added,
            ChangeRecord::Removed { .. } => ChangeType::Removed,
            ChangeRecord::Modified { .. } => ChangeType::Modified,
        }
    }

    pub fn reason(&self) -> Option<ModificationReason> {
        match self {
            ChangeRecord::Modified { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            ChangeRecord::Added { declaration, .. } => format!(
                "added {} `{}` at line {}",
                declaration.kind,
                declaration.signature(),
                declaration.line
            ),
            ChangeRecord::Removed { declaration, .. } => format!(
                "removed {} `{}` (was at line {})",
                declaration.kind,
                declaration.signature(),
                declaration.line
            ),
            ChangeRecord::Modified {
                old, new, reason, ..
            } => match reason {
                ModificationReason::KindChanged => {
                    format!("kind changed from {} to {}", old.kind, new.kind)
                }
                ModificationReason::SignatureChanged => format!(
                    "signature changed from `{}` to `{}`",
                    old.signature(),
                    new.signature()
                ),
                ModificationReason::DocumentationChanged => match (&old.docstring, &new.docstring)
                {
                    (None, Some(_)) => "documentation added".to_string(),
                    (Some(_), None) => "documentation removed".to_string(),
                    _ => "documentation changed".to_string(),
                },
            },
        }
    }

    pub fn to_notification(&self) -> Notification {
        Notification {
            change_type: self.change_type(),
            name: self.name().to_string(),
            detail: self.detail(),
        }
    }
}

impl Serialize for ChangeRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_notification().serialize(serializer)
    }
}

/// Compare two summaries at full granularity.
pub fn diff(old: &StructuralSummary, new: &StructuralSummary) -> Vec<ChangeRecord> {
    diff_with(old, new, Granularity::Full)
}

/// Compare two summaries. Records come back sorted by name, at most one
/// per name. For a name present on both sides the first mismatch in the
/// order kind, signature, documentation decides the reason.
pub fn diff_with(
    old: &StructuralSummary,
    new: &StructuralSummary,
    granularity: Granularity,
) -> Vec<ChangeRecord> {
    let names: BTreeSet<&str> = old.names().chain(new.names()).collect();

    names
        .into_iter()
        .filter_map(|name| match (old.get(name), new.get(name)) {
            (None, Some(added)) => Some(ChangeRecord::Added {
                name: name.to_string(),
                declaration: added.clone(),
            }),
            (Some(removed), None) => Some(ChangeRecord::Removed {
                name: name.to_string(),
                declaration: removed.clone(),
            }),
            (Some(before), Some(after)) => {
                modification(before, after, granularity).map(|reason| ChangeRecord::Modified {
                    name: name.to_string(),
                    old: before.clone(),
                    new: after.clone(),
                    reason,
                })
            }
            (None, None) => None,
        })
        .collect()
}

fn modification(
    old: &Declaration,
    new: &Declaration,
    granularity: Granularity,
) -> Option<ModificationReason> {
    if granularity == Granularity::Names {
        return None;
    }
    if old.kind != new.kind {
        return Some(ModificationReason::KindChanged);
    }
    if old.parameters != new.parameters || old.return_type != new.return_type {
        return Some(ModificationReason::SignatureChanged);
    }
    if granularity == Granularity::Full && old.docstring != new.docstring {
        return Some(ModificationReason::DocumentationChanged);
    }
    None
}
