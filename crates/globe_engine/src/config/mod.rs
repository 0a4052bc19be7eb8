//! Engine configuration
//!
//! Serde-backed configuration for the resource cache and the retrieval pool,
//! loadable from TOML or RON files with validated defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file was not valid TOML.
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The file was not valid RON.
    #[error("Failed to parse RON config: {0}")]
    Ron(#[from] ron::error::SpannedError),

    /// The parsed values are inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// GPU resource cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Total capacity for GPU-resident resources, in estimated bytes.
    pub capacity_bytes: usize,

    /// Eviction drains the cache down to this mark once the capacity is
    /// exceeded; must be below `capacity_bytes`.
    pub low_water_bytes: usize,

    /// Capacity of the secondary attribute-bundle cache, in bytes.
    pub bundle_capacity_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: 256 * 1024 * 1024,       // 256 MB
            low_water_bytes: 192 * 1024 * 1024,      // 75%
            bundle_capacity_bytes: 4 * 1024 * 1024,  // 4 MB
        }
    }
}

/// Background retrieval pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum concurrent decode workers; submissions beyond this are
    /// rejected rather than queued.
    pub max_workers: usize,

    /// Timeout applied to URL fetches, in seconds.
    pub network_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            network_timeout_secs: 10,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resource cache sizing.
    pub cache: CacheConfig,

    /// Retrieval pool sizing.
    pub retrieval: RetrievalConfig,
}

impl EngineConfig {
    /// Load and validate a TOML configuration file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON configuration file.
    pub fn from_ron_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = ron::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the internal consistency of the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.low_water_bytes == 0 {
            return Err(ConfigError::Invalid(
                "cache.low_water_bytes must be positive".to_string(),
            ));
        }
        if self.cache.low_water_bytes >= self.cache.capacity_bytes {
            return Err(ConfigError::Invalid(format!(
                "cache.low_water_bytes ({}) must be below cache.capacity_bytes ({})",
                self.cache.low_water_bytes, self.cache.capacity_bytes
            )));
        }
        if self.cache.bundle_capacity_bytes < 2 {
            return Err(ConfigError::Invalid(
                "cache.bundle_capacity_bytes must be at least 2".to_string(),
            ));
        }
        if self.retrieval.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_toml_parse_with_partial_overrides() {
        let text = r#"
            [cache]
            capacity_bytes = 1048576
            low_water_bytes = 524288

            [retrieval]
            max_workers = 2
        "#;
        let config: EngineConfig = toml::from_str(text).expect("parses");
        assert_eq!(config.cache.capacity_bytes, 1_048_576);
        assert_eq!(config.cache.low_water_bytes, 524_288);
        assert_eq!(config.retrieval.max_workers, 2);
        // Unspecified fields keep their defaults.
        assert_eq!(config.retrieval.network_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ron_parse() {
        let text = r#"(
            cache: (
                capacity_bytes: 2048,
                low_water_bytes: 1024,
                bundle_capacity_bytes: 256,
            ),
            retrieval: (
                max_workers: 1,
                network_timeout_secs: 3,
            ),
        )"#;
        let config: EngineConfig = ron::from_str(text).expect("parses");
        assert_eq!(config.cache.capacity_bytes, 2048);
        assert_eq!(config.retrieval.network_timeout_secs, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_low_water_must_be_below_capacity() {
        let mut config = EngineConfig::default();
        config.cache.low_water_bytes = config.cache.capacity_bytes;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = EngineConfig::default();
        config.retrieval.max_workers = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let text = toml::to_string(&config).expect("serializes");
        let parsed: EngineConfig = toml::from_str(&text).expect("parses back");
        assert_eq!(parsed.cache.capacity_bytes, config.cache.capacity_bytes);
        assert_eq!(parsed.retrieval.max_workers, config.retrieval.max_workers);
    }
}
