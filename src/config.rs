use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::storage::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::File => write!(f, "file"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl StorageBackend {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => StorageBackend::Memory,
            _ => StorageBackend::File,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Storage
    pub storage_backend: StorageBackend,
    pub data_dir: String,
    pub backup_version: String,

    // Retry (per storage call) and backend init timeout
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub init_timeout_secs: u64,

    // Startup
    pub auto_recover: bool,

    // Logging
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let env = |key: &str, default: &str| -> String {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Config {
            storage_backend: StorageBackend::parse(&env("STORAGE_BACKEND", "file")),
            data_dir: env("DATA_DIR", "data"),
            backup_version: env("BACKUP_VERSION", "1.0.0"),
            retry_attempts: env("STORAGE_RETRY_ATTEMPTS", "3").parse().unwrap_or(3),
            retry_base_delay_ms: env("STORAGE_RETRY_DELAY_MS", "50").parse().unwrap_or(50),
            init_timeout_secs: env("STORAGE_INIT_TIMEOUT_SECS", "5").parse().unwrap_or(5),
            auto_recover: env("AUTO_RECOVER", "true").to_lowercase() == "true",
            log_level: env("LOG_LEVEL", "INFO"),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts.max(1),
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parse_defaults_to_file() {
        assert_eq!(StorageBackend::parse("memory"), StorageBackend::Memory);
        assert_eq!(StorageBackend::parse("MEM"), StorageBackend::Memory);
        assert_eq!(StorageBackend::parse("sqlite"), StorageBackend::File);
    }

    #[test]
    fn retry_policy_never_has_zero_attempts() {
        let mut cfg = crate::test_helpers::default_test_config();
        cfg.retry_attempts = 0;
        assert_eq!(cfg.retry_policy().max_attempts, 1);
    }
}
