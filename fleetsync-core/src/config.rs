//! YAML configuration for the sync daemon and CLI.
//!
//! # Storage layout
//!
//! ```text
//! ~/.fleetsync/
//!   config.yaml
//! ```
//!
//! # API pattern
//!
//! As with every path-touching function here, `fn_at(home: &Path, …)` takes an
//! explicit home (tests pass a `TempDir`) and `fn(…)` derives it from
//! `dirs::home_dir()`. A missing default file yields [`SyncConfig::default`];
//! a missing explicit `--config` path is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Worksheet the legacy consumers read from.
pub const DEFAULT_WORKSHEET: &str = "Drop box status (auto updated)";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where the deployed-set resolver reads deployment descriptions from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentSource {
    /// A JSON or YAML file holding a deployment list or a single deployment.
    Manifest(PathBuf),
    /// An HTTP endpoint returning a deployment list.
    Registry {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_file: Option<PathBuf>,
    },
}

/// Log line format for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings threaded explicitly through the sync loop, web handlers and
/// metrics collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// ID of the spreadsheet to keep in sync. Required to write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spreadsheet: Option<String>,
    pub worksheet: String,
    /// Cloud project holding the status store; discovered from the metadata
    /// server when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datastore_project: Option<String>,
    pub datastore_namespace: String,
    /// Mean of the exponential sleep between sync runs.
    pub expected_upload_interval_secs: f64,
    /// Hard ceiling on any single sleep.
    pub max_sleep_secs: f64,
    pub prometheus_port: u16,
    pub webserver_port: u16,
    pub fleet_cache_ttl_secs: u64,
    pub deployment_cache_ttl_secs: u64,
    /// Written as `- manifest: <path>` / `- registry: {url, token_file}`.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub deployments: Vec<DeploymentSource>,
    pub log_format: LogFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            spreadsheet: None,
            worksheet: DEFAULT_WORKSHEET.to_owned(),
            datastore_project: None,
            datastore_namespace: "scraper".to_owned(),
            expected_upload_interval_secs: 300.0,
            max_sleep_secs: 3600.0,
            prometheus_port: 9090,
            webserver_port: 80,
            fleet_cache_ttl_secs: 30,
            deployment_cache_ttl_secs: 3600,
            deployments: Vec::new(),
            log_format: LogFormat::Text,
        }
    }
}

impl SyncConfig {
    /// Check the fields needed before anything is written to the spreadsheet.
    ///
    /// Returns the spreadsheet ID on success.
    pub fn require_spreadsheet(&self) -> Result<&str, ConfigError> {
        match self.spreadsheet.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(ConfigError::Invalid(
                "spreadsheet ID is required (--spreadsheet or `spreadsheet:` in config)"
                    .to_owned(),
            )),
        }
    }

    /// Validate value ranges that would otherwise fail at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.expected_upload_interval_secs.is_finite()
            && self.expected_upload_interval_secs > 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "expected_upload_interval_secs must be positive, got {}",
                self.expected_upload_interval_secs
            )));
        }
        if !(self.max_sleep_secs.is_finite() && self.max_sleep_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_sleep_secs must be positive, got {}",
                self.max_sleep_secs
            )));
        }
        if self.worksheet.trim().is_empty() {
            return Err(ConfigError::Invalid("worksheet must not be empty".to_owned()));
        }
        if self.datastore_namespace.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "datastore_namespace must not be empty".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn fleet_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.fleet_cache_ttl_secs)
    }

    pub fn deployment_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.deployment_cache_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<home>/.fleetsync/config.yaml`, pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".fleetsync").join("config.yaml")
}

/// Parse the config file at `path`. The file must exist.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(SyncConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<home>/.fleetsync/config.yaml`, or defaults when it does not exist.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    load_from(&path)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home()?)
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
