//! Query engine configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default cache capacity (number of entries) for each cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

fn default_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

/// Configuration for the query engine caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEngineConfig {
    /// Maximum number of resolved queries kept.
    pub positive_capacity: usize,
    /// Maximum number of confirmed misses kept.
    pub negative_capacity: usize,
    /// Whether to enable caching.
    pub cache_enabled: bool,
}

impl Default for QueryEngineConfig {
    fn default() -> Self {
        Self {
            positive_capacity: DEFAULT_CACHE_CAPACITY,
            negative_capacity: DEFAULT_CACHE_CAPACITY,
            cache_enabled: true,
        }
    }
}

impl QueryEngineConfig {
    /// Create a new configuration with the same capacity for both caches.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positive_capacity: capacity,
            negative_capacity: capacity,
            cache_enabled: true,
        }
    }

    /// Create a configuration with caching disabled.
    pub fn no_cache() -> Self {
        Self {
            positive_capacity: 0,
            negative_capacity: 0,
            cache_enabled: false,
        }
    }
}

/// On-disk configuration: where the store lives and how big the caches are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Path to an extracted store file.
    pub database: PathBuf,
    #[serde(default = "default_capacity")]
    pub positive_cache_capacity: usize,
    #[serde(default = "default_capacity")]
    pub negative_cache_capacity: usize,
}

impl Config {
    /// Configuration with default cache sizes.
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            positive_cache_capacity: DEFAULT_CACHE_CAPACITY,
            negative_cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Cache settings for the query engine.
    pub fn engine_config(&self) -> QueryEngineConfig {
        QueryEngineConfig {
            positive_capacity: self.positive_cache_capacity,
            negative_capacity: self.negative_cache_capacity,
            cache_enabled: self.positive_cache_capacity > 0 || self.negative_cache_capacity > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = QueryEngineConfig::default();
        assert_eq!(config.positive_capacity, 10_000);
        assert_eq!(config.negative_capacity, 10_000);
        assert!(config.cache_enabled);
        assert!(!QueryEngineConfig::no_cache().cache_enabled);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cellstore.json");

        let mut config = Config::new("/data/towers/db.bcs");
        config.negative_cache_capacity = 500;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.engine_config().negative_capacity, 500);
    }

    #[test]
    fn test_config_defaults_missing_capacities() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cellstore.json");
        fs::write(&path, r#"{ "database": "db.bcs" }"#).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.database, PathBuf::from("db.bcs"));
        assert_eq!(loaded.positive_cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_config_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cellstore.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }
}
