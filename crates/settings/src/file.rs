//! TOML config file support.
//!
//! Config location: `~/.config/aiterm/config.toml`

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// User-facing config parsed from TOML. All fields are optional; anything
/// unset falls back to the compile-time defaults in `constants`.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Quiet period before a freshly spawned session counts as settled, in ms.
    pub settle_quiet_ms: Option<u64>,
    /// Autocomplete debounce delay, in ms.
    pub autocomplete_debounce_ms: Option<u64>,
    /// Minimum input length before autocomplete dispatches a request.
    pub autocomplete_min_query_len: Option<usize>,
    /// Maximum number of history search results.
    pub history_max_results: Option<usize>,
}

/// Merged view of the compile-time defaults with config overrides applied.
///
/// This is what the engine consumes; it never reads the TOML file itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTuning {
    pub settle_quiet: Duration,
    pub autocomplete_debounce: Duration,
    pub autocomplete_min_query_len: usize,
    pub history_max_results: usize,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            settle_quiet: crate::constants::settle::QUIET_PERIOD,
            autocomplete_debounce: crate::constants::autocomplete::DEBOUNCE_DELAY,
            autocomplete_min_query_len: crate::constants::autocomplete::MIN_QUERY_LEN,
            history_max_results: crate::constants::history::MAX_RESULTS,
        }
    }
}

impl Config {
    /// Produce the merged tuning view where config values override defaults.
    pub fn tuning(&self) -> EngineTuning {
        let defaults = EngineTuning::default();
        EngineTuning {
            settle_quiet: self
                .settle_quiet_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_quiet),
            autocomplete_debounce: self
                .autocomplete_debounce_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.autocomplete_debounce),
            autocomplete_min_query_len: self
                .autocomplete_min_query_len
                .unwrap_or(defaults.autocomplete_min_query_len),
            history_max_results: self
                .history_max_results
                .unwrap_or(defaults.history_max_results),
        }
    }
}

/// Path to the config file (`~/.config/aiterm/config.toml`).
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("aiterm").join("config.toml"))
}

/// Load the config file, falling back to defaults when missing or invalid.
pub fn load_config() -> Config {
    match config_path() {
        Ok(path) => load_config_from(&path),
        Err(error) => {
            tracing::warn!("Config path unavailable: {error:#}");
            Config::default()
        }
    }
}

/// Load a config file from an explicit path.
///
/// A malformed file is logged and ignored rather than aborting startup —
/// the engine can always run on its compile-time defaults.
fn load_config_from(path: &std::path::Path) -> Config {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return Config::default(),
    };

    match toml::from_str(&contents) {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!("Failed to parse {path:?}: {error}");
            Config::default()
        }
    }
}
