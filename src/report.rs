//! Rendering comparison results for issue, pull-request or README tooling.

use std::str::FromStr;

use serde::Serialize;

use crate::delta::{ChangeRecord, ChangeType};
use crate::engine::FileDelta;
use crate::error::{ApiDeltaError, Result};
use crate::snapshot::Revision;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
}

impl FromStr for ReportFormat {
    type Err = ApiDeltaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            other => Err(ApiDeltaError::Configuration(format!(
                "report format = \"{}\" (expected markdown or json)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiReport {
    pub head: String,
    pub files: Vec<FileDelta>,
    #[serde(skip)]
    short_head: String,
}

impl ApiReport {
    pub fn new(head: &Revision, short_sha_len: usize, files: Vec<FileDelta>) -> Self {
        Self {
            head: head.to_string(),
            files,
            short_head: head.short(short_sha_len),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.iter().all(FileDelta::is_empty)
    }

    pub fn change_count(&self) -> usize {
        self.files.iter().map(|f| f.changes.len()).sum()
    }

    pub fn render(&self, format: ReportFormat) -> serde_json::Result<String> {
        match format {
            ReportFormat::Markdown => Ok(self.to_markdown()),
            ReportFormat::Json => serde_json::to_string_pretty(self),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut lines = vec![format!("### API Change Report ({})", self.short_head)];

        if self.is_empty() {
            lines.push(String::new());
            lines.push("No significant top-level function/class changes detected.".to_string());
            return lines.join("\n");
        }

        lines.push(String::new());
        lines.push("Detected potential changes:".to_string());

        let sections = [
            (ChangeType::Added, "**Added Functions/Classes:**"),
            (ChangeType::Removed, "**Removed Functions/Classes:**"),
            (ChangeType::Modified, "**Modified Functions/Classes:**"),
        ];
        for (change_type, heading) in sections {
            let bullets: Vec<String> = self
                .files
                .iter()
                .flat_map(|file| {
                    file.changes
                        .iter()
                        .filter(move |c| c.change_type() == change_type)
                        .map(move |c| bullet(c, &file.path))
                })
                .collect();
            if bullets.is_empty() {
                continue;
            }
            lines.push(String::new());
            lines.push(heading.to_string());
            lines.extend(bullets);
        }

        lines.join("\n")
    }
}

fn bullet(change: &ChangeRecord, path: &str) -> String {
    match change {
        ChangeRecord::Added { name, .. } => format!("- `+ {}` in `{}`", name, path),
        ChangeRecord::Removed { name, .. } => format!("- `- {}` in `{}`", name, path),
        ChangeRecord::Modified { name, .. } => {
            format!("- `~ {}` in `{}`: {}", name, path, change.detail())
        }
    }
}
