//! Simulator settings: JSON file with defaults, then environment overrides.
//!
//! A missing config file is not an error; a malformed one is.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::commission::{load_offer_table, OfferTable, OfferTableError};
use crate::optimizer::TierCaps;
use crate::parallel::{SearchBudget, WorkerPool};

pub const DEFAULT_CONFIG_PATH: &str = "data/tiermix.json";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
/// Alternatives shown after the best scenario.
pub const DEFAULT_DISPLAY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub bind_addr: String,
    /// JSON offer table to use instead of the built-in reference offers.
    pub offers_path: Option<String>,
    /// Largest per-tier caps accepted from the CLI and the API. Tiers left out keep
    /// their default limit.
    #[serde(deserialize_with = "deserialize_cap_limits")]
    pub cap_limits: TierCaps,
    pub display_limit: usize,
    /// Search worker threads; 0 uses every core.
    pub workers: usize,
    /// Per-search deadline in milliseconds. None lets searches run to completion.
    pub timeout_ms: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            offers_path: None,
            cap_limits: TierCaps::DEFAULT_LIMITS,
            display_limit: DEFAULT_DISPLAY_LIMIT,
            workers: 0,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CapLimitOverrides {
    #[serde(rename = "10k")]
    t1: Option<u32>,
    #[serde(rename = "30k")]
    t2: Option<u32>,
    #[serde(rename = "50k")]
    t3: Option<u32>,
    #[serde(rename = "100k")]
    t4: Option<u32>,
}

fn deserialize_cap_limits<'de, D>(deserializer: D) -> Result<TierCaps, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = CapLimitOverrides::deserialize(deserializer)?;
    let defaults = TierCaps::DEFAULT_LIMITS;
    Ok(TierCaps::new(
        overrides.t1.unwrap_or(defaults.t1),
        overrides.t2.unwrap_or(defaults.t2),
        overrides.t3.unwrap_or(defaults.t3),
        overrides.t4.unwrap_or(defaults.t4),
    ))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Offers(#[from] OfferTableError),
}

impl SimulatorConfig {
    pub fn worker_pool(&self) -> WorkerPool {
        WorkerPool::with_workers(self.workers)
    }

    /// Fresh budget for one search, starting the deadline clock now.
    pub fn search_budget(&self) -> SearchBudget {
        match self.timeout_ms {
            Some(ms) => SearchBudget::unlimited().with_timeout(Duration::from_millis(ms)),
            None => SearchBudget::unlimited(),
        }
    }

    pub fn offer_table(&self) -> Result<OfferTable, ConfigError> {
        match self.offers_path.as_deref() {
            Some(path) => Ok(load_offer_table(path)?),
            None => Ok(OfferTable::reference()),
        }
    }

    /// Apply `TIERMIX_*` overrides. Unparseable numbers are ignored with a warning.
    pub fn apply_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("TIERMIX_BIND") {
            self.bind_addr = bind;
        }
        if let Some(path) = lookup("TIERMIX_OFFERS") {
            self.offers_path = Some(path);
        }
        if let Some(raw) = lookup("TIERMIX_WORKERS") {
            match raw.trim().parse() {
                Ok(workers) => self.workers = workers,
                Err(_) => warn!(value = %raw, "ignoring invalid TIERMIX_WORKERS"),
            }
        }
        if let Some(raw) = lookup("TIERMIX_TIMEOUT_MS") {
            match raw.trim().parse() {
                Ok(0) => self.timeout_ms = None,
                Ok(ms) => self.timeout_ms = Some(ms),
                Err(_) => warn!(value = %raw, "ignoring invalid TIERMIX_TIMEOUT_MS"),
            }
        }
        self
    }
}

/// Read a config file. Returns defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<SimulatorConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(SimulatorConfig::default());
    }
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: display,
        source,
    })
}

/// Config for the running process: `TIERMIX_CONFIG` (or the default path) plus env overrides.
pub fn load_from_env() -> Result<SimulatorConfig, ConfigError> {
    let path = env::var("TIERMIX_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    Ok(load_config(path)?.apply_env_overrides(|key| env::var(key).ok()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("tiermix-config-{name}-{stamp}.json"))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(temp_path("missing")).expect("missing file is fine");
        assert_eq!(config, SimulatorConfig::default());
        assert_eq!(config.cap_limits, TierCaps::new(10, 10, 5, 5));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let path = temp_path("partial");
        fs::write(&path, r#"{"display_limit": 10, "cap_limits": {"10k": 20}}"#)
            .expect("fixture should be written");
        let config = load_config(&path).expect("config should parse");
        assert_eq!(config.display_limit, 10);
        assert_eq!(config.cap_limits, TierCaps::new(20, 10, 5, 5));
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn partial_cap_limits_still_admit_form_caps() {
        let path = temp_path("limits");
        fs::write(&path, r#"{"cap_limits": {"100k": 2}}"#).expect("fixture should be written");
        let config = load_config(&path).expect("config should parse");
        assert_eq!(config.cap_limits, TierCaps::new(10, 10, 5, 2));
        assert!(TierCaps::FORM_DEFAULTS
            .exceeding(&config.cap_limits)
            .is_empty());
        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = temp_path("malformed");
        fs::write(&path, "{not json").expect("fixture should be written");
        assert!(matches!(load_config(&path), Err(ConfigError::Parse { .. })));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("TIERMIX_BIND", "0.0.0.0:8080"),
            ("TIERMIX_WORKERS", "3"),
            ("TIERMIX_TIMEOUT_MS", "2500"),
        ]
        .into_iter()
        .collect();
        let config = SimulatorConfig::default()
            .apply_env_overrides(|key| vars.get(key).map(|value| value.to_string()));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.workers, 3);
        assert_eq!(config.timeout_ms, Some(2500));
        assert_eq!(config.worker_pool(), WorkerPool::with_workers(3));
    }

    #[test]
    fn invalid_env_numbers_are_ignored() {
        let config = SimulatorConfig::default().apply_env_overrides(|key| match key {
            "TIERMIX_WORKERS" => Some("many".to_string()),
            "TIERMIX_TIMEOUT_MS" => Some("0".to_string()),
            _ => None,
        });
        assert_eq!(config.workers, 0);
        assert_eq!(config.timeout_ms, None);
    }

    #[test]
    fn custom_offer_table_is_loaded() {
        let path = temp_path("offers");
        fs::write(
            &path,
            r#"[{"tier":"30k","aggressiveness":"high","commission_per_client":150,"tpv_per_client":30000}]"#,
        )
        .expect("fixture should be written");
        let config = SimulatorConfig {
            offers_path: Some(path.to_string_lossy().into_owned()),
            ..SimulatorConfig::default()
        };
        let table = config.offer_table().expect("offers should load");
        assert_eq!(table.len(), 1);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_offer_table_is_an_error() {
        let config = SimulatorConfig {
            offers_path: Some(temp_path("no-offers").to_string_lossy().into_owned()),
            ..SimulatorConfig::default()
        };
        assert!(matches!(
            config.offer_table(),
            Err(ConfigError::Offers(OfferTableError::Io { .. }))
        ));
    }
}
