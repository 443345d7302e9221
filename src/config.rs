use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::delta::Granularity;
use crate::engine::{CompareOptions, ParseErrorPolicy};
use crate::error::ApiDeltaError;
use crate::report::ReportFormat;

/// Environment variable naming a config file to use when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "APIDELTA_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub comparison: ComparisonConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonConfig {
    /// What to do when one side fails to parse: "abort" (default) or "treat_as_empty"
    #[serde(default = "default_on_parse_error")]
    pub on_parse_error: String,

    /// Attributes compared: "names", "signatures" or "full" (default)
    #[serde(default = "default_granularity")]
    pub granularity: String,

    /// File suffixes that are analyzed; everything else is skipped
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            on_parse_error: default_on_parse_error(),
            granularity: default_granularity(),
            extensions: default_extensions(),
        }
    }
}

impl ComparisonConfig {
    /// Validate the policy strings into engine options.
    pub fn compare_options(&self) -> crate::error::Result<CompareOptions> {
        Ok(CompareOptions {
            on_parse_error: self.on_parse_error.parse::<ParseErrorPolicy>()?,
            granularity: self.granularity.parse::<Granularity>()?,
        })
    }

    pub fn is_analyzable(&self, path: &str) -> bool {
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// "markdown" (default) or "json"
    #[serde(default = "default_format")]
    pub format: String,

    /// Optional file the report is also written to (e.g. docs/api_change_report.md)
    #[serde(default)]
    pub output_path: Option<String>,

    /// Characters of the head revision shown in the Markdown heading
    #[serde(default = "default_short_sha_len")]
    pub short_sha_len: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            output_path: None,
            short_sha_len: default_short_sha_len(),
        }
    }
}

impl ReportConfig {
    pub fn report_format(&self) -> crate::error::Result<ReportFormat> {
        self.format.parse::<ReportFormat>()
    }
}

fn default_on_parse_error() -> String {
    ParseErrorPolicy::default().as_str().to_string()
}

fn default_granularity() -> String {
    Granularity::default().as_str().to_string()
}

fn default_extensions() -> Vec<String> {
    vec![".py".to_string()]
}

fn default_format() -> String {
    "markdown".to_string()
}

fn default_short_sha_len() -> usize {
    7
}

impl Config {
    /// Load configuration from a specific path, or use default search paths
    pub fn load_with_path(path: Option<String>) -> Result<Self> {
        // Explicit path (CLI flag, then environment) must load or fail
        let explicit = path.or_else(|| env::var(CONFIG_ENV_VAR).ok().filter(|p| !p.is_empty()));
        if let Some(config_path) = explicit {
            debug!("Loading config from explicit path: {}", config_path);
            return Self::load_from_path(&config_path)
                .with_context(|| format!("Failed to load config from {}", config_path));
        }

        // Per-repo config
        match Self::load_from_path("apidelta.toml") {
            Ok(config) => {
                debug!("Loaded config from ./apidelta.toml");
                return Ok(config);
            }
            Err(e) => debug!("Skipping ./apidelta.toml: {}", e),
        }

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("apidelta").join("config.toml");
            if let Ok(config) = Self::load_from_path(&config_path) {
                debug!("Loaded config from {:?}", config_path);
                return Ok(config);
            }
        }

        debug!("Using default config");
        Ok(Self::default())
    }

    fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Fail early on policy values the engine would reject later.
    pub fn validate(&self) -> std::result::Result<(), ApiDeltaError> {
        self.comparison.compare_options()?;
        self.report.report_format()?;
        if self.comparison.extensions.is_empty() {
            return Err(ApiDeltaError::Configuration(
                "comparison.extensions must list at least one suffix".to_string(),
            ));
        }
        Ok(())
    }
}
