use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::ApiDeltaEngine;
use crate::report::ApiReport;
use crate::snapshot::{Revision, SnapshotLoader};

/// Compare `files` between `base` and `head` and print the report.
#[allow(clippy::too_many_arguments)]
pub fn run(
    files: Vec<String>,
    base: String,
    head: String,
    repo: String,
    config_path: Option<String>,
    format_override: Option<String>,
    output_override: Option<String>,
    on_parse_error_override: Option<String>,
    granularity_override: Option<String>,
) -> Result<()> {
    let mut config = Config::load_with_path(config_path)?;

    // Apply CLI overrides
    if let Some(policy) = on_parse_error_override {
        info!("CLI override: on_parse_error = {}", policy);
        config.comparison.on_parse_error = policy;
    }
    if let Some(granularity) = granularity_override {
        info!("CLI override: granularity = {}", granularity);
        config.comparison.granularity = granularity;
    }
    if let Some(format) = format_override {
        info!("CLI override: format = {}", format);
        config.report.format = format;
    }
    if let Some(output) = output_override {
        info!("CLI override: output = {}", output);
        config.report.output_path = Some(output);
    }
    config.validate()?;

    let options = config.comparison.compare_options()?;
    let format = config.report.report_format()?;
    let base: Revision = base.parse()?;
    let head: Revision = head.parse()?;

    let (analyzable, skipped): (Vec<String>, Vec<String>) = files
        .into_iter()
        .partition(|f| config.comparison.is_analyzable(f));
    for file in &skipped {
        debug!("Skipping {}: not a configured source extension", file);
    }

    let deltas = if analyzable.is_empty() {
        info!("No source files provided for analysis");
        Vec::new()
    } else {
        info!("Starting analysis between {} and {}", base, head);
        let (history, root) = super::open_history(&repo)?;
        let engine = ApiDeltaEngine::new(SnapshotLoader::new(root, history), options);
        engine.compare_files(&analyzable, &base, &head)?
    };

    let report = ApiReport::new(&head, config.report.short_sha_len, deltas);
    let rendered = report.render(format)?;
    info!("{} change(s) detected", report.change_count());

    println!("{}", rendered);

    if let Some(ref output) = config.report.output_path {
        write_report(Path::new(output), &rendered)?;
        info!("Report saved to {}", output);
    }

    Ok(())
}

fn write_report(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
