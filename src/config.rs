use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;

use crate::constants;

/// Runtime settings for the bridge, usually read from a JSON file next to the host binary.
///
/// Every field is optional in the file; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Directory holding the native library. Defaults to the executable's directory.
    pub library_dir: Option<PathBuf>,
    /// Library base name without platform prefix/suffix.
    pub library_name: String,
    /// `env_logger` filter directive.
    pub log_filter: String,
    pub navigation_reply_timeout_ms: u64,
    pub suppress_redundant_resize: bool,
    pub max_pending_loads: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            library_dir: None,
            library_name: constants::DEFAULT_LIBRARY_NAME.to_string(),
            log_filter: constants::DEFAULT_LOG_FILTER.to_string(),
            navigation_reply_timeout_ms: constants::DEFAULT_NAVIGATION_REPLY_TIMEOUT_MS,
            suppress_redundant_resize: true,
            max_pending_loads: constants::DEFAULT_MAX_PENDING_LOADS,
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid bridge configuration JSON")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("In config {}", path.display()))
    }

    /// Reads the file if given, then applies `WVBRIDGE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        Ok(config.with_overrides(std::env::vars()))
    }

    /// Applies overrides from `(name, value)` pairs, as produced by `std::env::vars()`.
    pub fn with_overrides<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            match name.as_str() {
                constants::ENV_LIBRARY_DIR if !value.is_empty() => {
                    debug!("[Config] {} overrides library_dir", name);
                    self.library_dir = Some(PathBuf::from(value));
                }
                constants::ENV_LOG_FILTER if !value.is_empty() => {
                    self.log_filter = value;
                }
                _ => {}
            }
        }
        self
    }

    pub fn navigation_reply_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_reply_timeout_ms)
    }
}
