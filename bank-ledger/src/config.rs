//! Configuration for the ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// RocksDB configuration
    #[serde(default)]
    pub rocksdb: RocksDBConfig,

    /// Storage transaction configuration
    #[serde(default)]
    pub transactions: TransactionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/bank"),
            service_name: "bank-ledger".to_string(),
            rocksdb: RocksDBConfig::default(),
            transactions: TransactionConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            max_background_jobs: 4,
            enable_statistics: false,
        }
    }
}

/// Storage transaction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// How long a transaction waits for an account row lock (milliseconds)
    pub lock_timeout_ms: i64,

    /// Detect lock cycles between batches touching the same accounts
    pub deadlock_detect: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            deadlock_detect: true,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(service_name) = std::env::var("LEDGER_SERVICE_NAME") {
            config.service_name = service_name;
        }

        if let Ok(timeout) = std::env::var("LEDGER_LOCK_TIMEOUT_MS") {
            config.transactions.lock_timeout_ms = timeout.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid LEDGER_LOCK_TIMEOUT_MS '{}': {}", timeout, e))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "bank-ledger");
        assert_eq!(config.transactions.lock_timeout_ms, 5_000);
        assert!(config.transactions.deadlock_detect);
    }

    #[test]
    fn test_from_file_fills_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");
        std::fs::write(
            &path,
            "data_dir = \"/var/lib/bank\"\nservice_name = \"bank\"\n\n[transactions]\nlock_timeout_ms = 250\ndeadlock_detect = false\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/bank"));
        assert_eq!(config.service_name, "bank");
        assert_eq!(config.transactions.lock_timeout_ms, 250);
        assert!(!config.transactions.deadlock_detect);
        assert_eq!(config.rocksdb.max_background_jobs, 4);
    }

    #[test]
    fn test_from_env_overrides_service_name() {
        std::env::set_var("LEDGER_SERVICE_NAME", "bank-admin");
        let config = Config::from_env().unwrap();
        std::env::remove_var("LEDGER_SERVICE_NAME");

        assert_eq!(config.service_name, "bank-admin");
        assert_eq!(config.transactions.lock_timeout_ms, 5_000);
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "data_dir = [").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
