use anyhow::Result;

use crate::config::Config;
use crate::engine::ApiDeltaEngine;
use crate::snapshot::{Revision, SnapshotLoader};

/// Print the top-level declarations of `file` at `revision` as JSON.
pub fn run(
    file: String,
    revision: String,
    repo: String,
    config_path: Option<String>,
) -> Result<()> {
    let json = render(&file, &revision, &repo, config_path)?;
    println!("{}", json);
    Ok(())
}

fn render(
    file: &str,
    revision: &str,
    repo: &str,
    config_path: Option<String>,
) -> Result<String> {
    let config = Config::load_with_path(config_path)?;
    config.validate()?;
    let options = config.comparison.compare_options()?;
    let revision: Revision = revision.parse()?;

    let (history, root) = super::open_history(repo)?;
    let engine = ApiDeltaEngine::new(SnapshotLoader::new(root, history), options);
    let summary = engine.summarize(file, &revision)?;

    Ok(serde_json::to_string_pretty(&summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::test_support::{empty_config, scratch_repo};
    use std::fs;

    #[test]
    fn test_render_at_previous_commit() {
        let repo = scratch_repo();
        let config = empty_config(repo.path());

        let json = render(
            "pkg/api.py",
            "HEAD~1",
            &repo.path().to_string_lossy(),
            Some(config),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["connect"]["kind"], "function");
        assert_eq!(value["connect"]["parameters"], serde_json::json!(["host"]));
        assert_eq!(value["connect"]["docstring"], "Open a connection.");
        assert_eq!(value["Client"]["kind"], "class");
        assert_eq!(value["Client"]["line"], 4);
    }

    #[test]
    fn test_render_working_copy_and_missing_file() {
        let repo = scratch_repo();
        let config = empty_config(repo.path());
        fs::write(repo.path().join("pkg/extra.py"), "class Helper:\n    pass\n").unwrap();
        let repo_path = repo.path().to_string_lossy().to_string();

        let json = render("pkg/extra.py", "current", &repo_path, Some(config.clone())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Helper"]["kind"], "class");
        assert!(value.get("helper").is_none());

        let json = render("pkg/extra.py", "HEAD~1", &repo_path, Some(config)).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_run_unknown_revision_fails() {
        let repo = scratch_repo();
        let config = empty_config(repo.path());

        let err = run(
            "pkg/api.py".to_string(),
            "no-such-ref".to_string(),
            repo.path().to_string_lossy().to_string(),
            Some(config),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no-such-ref"));
    }

    #[test]
    fn test_run_prints_summary() {
        let repo = scratch_repo();
        let config = empty_config(repo.path());

        run(
            "pkg/api.py".to_string(),
            "HEAD".to_string(),
            repo.path().to_string_lossy().to_string(),
            Some(config),
        )
        .unwrap();
    }
}
