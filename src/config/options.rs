// src/config/options.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use super::consts::*;
use crate::data::Schema;
use crate::error::ConfigError;
use crate::specs::locator::Signature;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
}

impl ExportFormat {
    pub fn ext(&self) -> &'static str {
        match self { ExportFormat::Csv => "csv", ExportFormat::Tsv => "tsv" }
    }
    pub fn delim(&self) -> char {
        match self { ExportFormat::Csv => ',', ExportFormat::Tsv => '\t' }
    }
}

/// Which page source provider fetches the markup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Plain request/response.
    Http,
    /// Headless browser, for tables filled in by page scripts.
    #[default]
    Browser,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorOptions {
    pub exact_class: String,
    pub marker_tokens: Vec<String>,
    pub min_header_cells: usize,
}

impl Default for LocatorOptions {
    fn default() -> Self {
        Self {
            exact_class: s!(EXACT_CLASS),
            marker_tokens: MARKER_TOKENS.iter().map(|t| s!(*t)).collect(),
            min_header_cells: MIN_HEADER_CELLS,
        }
    }
}

/// Everything a deployment can tune. Every field has a default, so an
/// empty (or absent) TOML file is a valid configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub url: String,
    pub poll_interval_seconds: u64,
    pub fetch_timeout_seconds: u64,
    pub schema: Vec<String>,
    pub output_directory: PathBuf,
    pub file_prefix: String,
    pub format: ExportFormat,
    pub source: SourceKind,
    pub browser_path: String,
    pub render_budget_ms: u64,
    pub max_cycles: Option<u64>,
    pub max_pending_batches: usize,
    pub empty_alert_after: u32,
    pub locator: LocatorOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: s!(DEFAULT_URL),
            poll_interval_seconds: POLL_INTERVAL_SECS,
            fetch_timeout_seconds: FETCH_TIMEOUT_SECS,
            schema: DEFAULT_SCHEMA.iter().map(|f| s!(*f)).collect(),
            output_directory: PathBuf::from(DEFAULT_OUT_DIR),
            file_prefix: s!(DEFAULT_PREFIX),
            format: ExportFormat::default(),
            source: SourceKind::default(),
            browser_path: s!(BROWSER_PATH),
            render_budget_ms: RENDER_BUDGET_MS,
            max_cycles: None,
            max_pending_batches: MAX_PENDING_BATCHES,
            empty_alert_after: EMPTY_ALERT_AFTER,
            locator: LocatorOptions::default(),
        }
    }
}

impl Config {
    /// Defaults, overlaid by the TOML file at `path` when given. Not validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Invalid(s!("url must not be empty")));
        }
        if self.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(s!("poll_interval_seconds must be at least 1")));
        }
        if self.fetch_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(s!("fetch_timeout_seconds must be at least 1")));
        }
        if self.max_pending_batches == 0 {
            return Err(ConfigError::Invalid(s!("max_pending_batches must be at least 1")));
        }
        if self.locator.marker_tokens.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::Invalid(s!("locator.marker_tokens must name at least one token")));
        }
        if self.locator.min_header_cells == 0 {
            return Err(ConfigError::Invalid(s!("locator.min_header_cells must be at least 1")));
        }
        self.schema().map(|_| ())
    }

    pub fn schema(&self) -> Result<Schema, ConfigError> {
        Schema::new(self.schema.iter().cloned())
    }

    pub fn signature(&self) -> Signature {
        Signature {
            exact_class: self.locator.exact_class.clone(),
            marker_tokens: self
                .locator
                .marker_tokens
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(|t| s!(t))
                .collect(),
            min_header_cells: self.locator.min_header_cells,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn render_budget(&self) -> Duration {
        Duration::from_millis(self.render_budget_ms)
    }
}
