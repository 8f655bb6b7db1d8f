//! Configuration for aztags.
//!
//! Values come from an optional TOML file, then `AZTAGS__SECTION__KEY`
//! environment variables; command-line flags are applied on top by the
//! binary.

use std::path::PathBuf;
use std::time::Duration;

use aztags_core::{ApplyConfig, ChangeTypes, DEFAULT_CAPABILITY_URL, ExportMode, FilterPolicy};
use serde::{Deserialize, Serialize};

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Core(#[from] aztags_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub apply: ApplySettings,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        ChangeTypes::parse(&self.reconcile.change_types)?;
        if let (Some(min), Some(max)) = (self.reconcile.min_scope, self.reconcile.max_scope) {
            if min > max {
                return Err(ConfigError::Validation(format!(
                    "reconcile.min_scope ({min}) must be <= reconcile.max_scope ({max})"
                )));
            }
        }
        for pattern in &self.reconcile.id_filters {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("reconcile.id_filters: bad pattern {pattern}: {e}"))
            })?;
        }
        if self.reconcile.skip_tags.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "reconcile.skip_tags must not contain empty names".into(),
            ));
        }

        if self.apply.max_failures == 0 {
            return Err(ConfigError::Validation("apply.max_failures must be > 0".into()));
        }
        if self.apply.submit_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "apply.submit_timeout_secs must be > 0".into(),
            ));
        }

        self.export.mode.parse::<ExportMode>()?;

        let url = url::Url::parse(&self.sources.capability_url).map_err(|e| {
            ConfigError::Validation(format!("sources.capability_url is not a valid URL: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(
                "sources.capability_url must be http or https".into(),
            ));
        }
        if self.sources.az_path.trim().is_empty() {
            return Err(ConfigError::Validation("sources.az_path must not be empty".into()));
        }

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }

    /// Effective configuration rendered as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn change_types(&self) -> Result<ChangeTypes> {
        Ok(ChangeTypes::parse(&self.reconcile.change_types)?)
    }

    pub fn export_mode(&self) -> Result<ExportMode> {
        Ok(self.export.mode.parse()?)
    }

    pub fn filter_policy(&self) -> Result<FilterPolicy> {
        let policy = FilterPolicy {
            min_scope: self.reconcile.min_scope,
            max_scope: self.reconcile.max_scope,
            skip_tags: self.reconcile.skip_tags.clone(),
            ..Default::default()
        };
        Ok(policy.with_id_filters(&self.reconcile.id_filters)?)
    }

    pub fn apply_config(&self, dry_run: bool) -> ApplyConfig {
        ApplyConfig {
            dry_run,
            max_failures: self.apply.max_failures,
            settle_delay: Duration::from_secs(self.apply.settle_delay_secs),
            submit_timeout: Duration::from_secs(self.apply.submit_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// `inc`, `all`, or a comma list such as `ADD,UPDATE`.
    #[serde(default = "default_change_types")]
    pub change_types: String,
    #[serde(default)]
    pub min_scope: Option<u32>,
    #[serde(default)]
    pub max_scope: Option<u32>,
    /// Resources carrying any of these tags are never touched.
    #[serde(default)]
    pub skip_tags: Vec<String>,
    /// Regexes that must all match the lower-cased resource ID.
    #[serde(default)]
    pub id_filters: Vec<String>,
}

fn default_change_types() -> String {
    "inc".into()
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            change_types: default_change_types(),
            min_scope: None,
            max_scope: None,
            skip_tags: Vec::new(),
            id_filters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplySettings {
    #[serde(default = "default_max_failures")]
    pub max_failures: usize,
    /// Wait between the two phases of a case-swap.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
}

fn default_max_failures() -> usize {
    10
}
fn default_settle_delay_secs() -> u64 {
    10
}
fn default_submit_timeout_secs() -> u64 {
    300
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            settle_delay_secs: default_settle_delay_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// `all` or `del`.
    #[serde(default = "default_export_mode")]
    pub mode: String,
}

fn default_export_mode() -> String {
    ExportMode::default().to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mode: default_export_mode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_capability_url")]
    pub capability_url: String,
    /// Local capability table; used instead of downloading when set.
    #[serde(default)]
    pub capability_file: Option<PathBuf>,
    #[serde(default = "default_az_path")]
    pub az_path: String,
}

fn default_capability_url() -> String {
    DEFAULT_CAPABILITY_URL.into()
}
fn default_az_path() -> String {
    "az".into()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            capability_url: default_capability_url(),
            capability_file: None,
            az_path: default_az_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "warn".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::{AppConfig, Result};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Environment variable naming the config file.
    pub const CONFIG_PATH_ENV: &str = "AZTAGS_CONFIG";

    /// `~/.aztags/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".aztags").join("config.toml"))
    }

    /// Load configuration from `path`, falling back to `AZTAGS_CONFIG` and then
    /// the default path. Missing files are not an error.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig> {
        let path = path
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(default_config_path);

        let mut builder = Config::builder();
        if let Some(pathbuf) = path {
            if pathbuf.exists() {
                tracing::debug!(path = %pathbuf.display(), "Loading config file");
                builder = builder.add_source(File::from(pathbuf));
            }
        }
        // Environment variable overrides, e.g., AZTAGS__APPLY__MAX_FAILURES=3
        builder = builder.add_source(
            Environment::with_prefix("AZTAGS")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("reconcile.skip_tags")
                .with_list_parse_key("reconcile.id_filters"),
        );
        let merged: AppConfig = builder.build()?.try_deserialize()?;
        merged.validate()?;
        Ok(merged)
    }
}
