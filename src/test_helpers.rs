use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::{Config, StorageBackend};
use crate::models::{RiskProfile, Trade};

/// Fixed base instant plus `secs` seconds.
pub fn ts(secs: i64) -> DateTime<Utc> {
    let base = DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    base + Duration::seconds(secs)
}

/// Trades with ids from 1 and one-minute spacing.
pub fn make_trades(results: &[f64]) -> Vec<Trade> {
    results
        .iter()
        .enumerate()
        .map(|(i, &result)| Trade {
            id: i as i64 + 1,
            result,
            timestamp: ts(i as i64 * 60),
        })
        .collect()
}

/// $10k account, $500 ceiling, 5% per trade, static.
pub fn sample_profile() -> RiskProfile {
    RiskProfile::new(10_000.0, 500.0, 5.0, false).unwrap()
}

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Fresh, empty directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let n = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "risk_journal_{}_{}_{}",
        tag,
        std::process::id(),
        n
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// In-memory backend, single attempt, no backoff.
pub fn default_test_config() -> Config {
    Config {
        storage_backend: StorageBackend::Memory,
        data_dir: std::env::temp_dir()
            .join("risk_journal_test_data")
            .to_string_lossy()
            .into_owned(),
        backup_version: "1.0.0".to_string(),
        retry_attempts: 1,
        retry_base_delay_ms: 0,
        init_timeout_secs: 5,
        auto_recover: true,
        log_level: "ERROR".to_string(),
    }
}
