//! Session configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable overriding the configured storage backend
pub const STORAGE_TYPE_ENV: &str = "REELPLAY_STORAGE_TYPE";

/// Persistence backend behind the play-record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Browser-local storage
    #[default]
    Local,
    Redis,
    /// Remote SQL database with high write latency
    D1,
}

impl StorageKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" | "localstorage" => Some(StorageKind::Local),
            "redis" => Some(StorageKind::Redis),
            "d1" => Some(StorageKind::D1),
            _ => None,
        }
    }

    /// Minimum time between throttled progress saves while playing
    pub fn save_interval(&self) -> Duration {
        match self {
            StorageKind::D1 => Duration::from_secs(10),
            StorageKind::Local | StorageKind::Redis => Duration::from_secs(5),
        }
    }
}

/// Playback session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Probe and rank sources when none is forced
    pub optimization_enabled: bool,
    /// Strip discontinuity markers from manifests
    pub ad_filter_enabled: bool,
    /// The player can swap its URL without being recreated
    pub supports_in_place_source_swap: bool,
    pub storage_kind: StorageKind,
    /// Volume of a freshly created player (0.0 - 1.0)
    pub initial_volume: f64,
    /// Delay before advancing after an episode ends
    pub auto_advance_delay_ms: u64,
    /// Timeout for each probe request
    pub probe_timeout_ms: u64,
    /// Timeout for catalog requests
    pub request_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            optimization_enabled: true,
            ad_filter_enabled: true,
            supports_in_place_source_swap: true,
            storage_kind: StorageKind::Local,
            initial_volume: 0.7,
            auto_advance_delay_ms: 1000,
            probe_timeout_ms: 5000,
            request_timeout_ms: 10000,
        }
    }
}

impl SessionConfig {
    /// Load from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                debug!(path = %path.display(), "Loaded session config");
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };

        if let Ok(value) = std::env::var(STORAGE_TYPE_ENV) {
            match StorageKind::parse(&value) {
                Some(kind) => config.storage_kind = kind,
                None => warn!(value = %value, "Ignoring unknown storage type"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::InvalidConfig(format!(
                "initial_volume must be within [0, 1], got {}",
                self.initial_volume
            )));
        }
        if self.request_timeout_ms == 0 || self.probe_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn auto_advance_delay(&self) -> Duration {
        Duration::from_millis(self.auto_advance_delay_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert!(config.optimization_enabled);
        assert!(config.ad_filter_enabled);
        assert_eq!(config.initial_volume, 0.7);
        assert_eq!(config.auto_advance_delay(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "storage_kind": "d1", "ad_filter_enabled": false }"#).unwrap();
        assert_eq!(config.storage_kind, StorageKind::D1);
        assert!(!config.ad_filter_enabled);
        assert!(config.supports_in_place_source_swap);
    }

    #[test]
    fn test_save_interval_by_backend() {
        assert_eq!(StorageKind::Local.save_interval(), Duration::from_secs(5));
        assert_eq!(StorageKind::D1.save_interval(), Duration::from_secs(10));
        assert_eq!(StorageKind::parse("LocalStorage"), Some(StorageKind::Local));
        assert_eq!(StorageKind::parse("sqlite"), None);
    }

    #[test]
    fn test_validate_rejects_bad_volume() {
        let config = SessionConfig {
            initial_volume: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
