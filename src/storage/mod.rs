pub mod file;
pub mod memory;
pub mod platform;
pub mod retry;

pub use file::{FileTier, JsonFileConfigStore, JsonFileTradeStore};
pub use memory::{MemoryConfigStore, MemoryTier, MemoryTradeStore};
pub use platform::{select_platform, FilePlatform, MemoryPlatform, PlatformPersistence};
pub use retry::{with_retry, RetryPolicy};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;
use crate::models::{NewTrade, RiskProfile, Trade, TradeRecord};

/// Persists the risk settings record.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    fn name(&self) -> &str;
    async fn save_risk_settings(&self, profile: &RiskProfile) -> StorageResult<()>;
    async fn load_risk_settings(&self) -> StorageResult<Option<RiskProfile>>;
    async fn clear_risk_settings(&self) -> StorageResult<()>;
    async fn has_risk_settings(&self) -> StorageResult<bool>;
}

/// Ordered trade storage. The store owns identity: `save_trade` and
/// `import_trades` assign ids, callers never do.
#[async_trait]
pub trait TradeStore: Send + Sync {
    fn name(&self) -> &str;
    async fn initialize_database(&self) -> StorageResult<()>;
    async fn get_all_trades(&self) -> StorageResult<Vec<Trade>>;
    async fn save_trade(&self, trade: NewTrade) -> StorageResult<Trade>;
    async fn update_trade(&self, trade: &Trade) -> StorageResult<Trade>;
    async fn delete_trade(&self, id: i64) -> StorageResult<()>;
    async fn get_trade_by_id(&self, id: i64) -> StorageResult<Option<Trade>>;
    async fn clear_all_trades(&self) -> StorageResult<()>;
    async fn get_trades_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Trade>>;
    async fn get_trades_count(&self) -> StorageResult<usize>;
    async fn get_recent_trades(&self, limit: usize) -> StorageResult<Vec<Trade>>;
    async fn export_trades(&self) -> StorageResult<Vec<TradeRecord>>;
    async fn import_trades(&self, records: &[TradeRecord]) -> StorageResult<usize>;
    async fn close(&self) -> StorageResult<()>;
}

/// A plain key-value area used to mirror snapshots.
#[async_trait]
pub trait BackupTier: Send + Sync {
    fn name(&self) -> &str;
    async fn is_available(&self) -> bool;
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    async fn remove(&self, key: &str) -> StorageResult<()>;
    async fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Shared by every store: trades in `[start, end]`, insertion order kept.
pub(crate) fn filter_date_range(
    trades: &[Trade],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Trade> {
    trades
        .iter()
        .filter(|t| t.timestamp >= start && t.timestamp <= end)
        .cloned()
        .collect()
}

pub(crate) fn most_recent(trades: &[Trade], limit: usize) -> Vec<Trade> {
    let mut recent: Vec<Trade> = trades.to_vec();
    recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
    recent.truncate(limit);
    recent
}
