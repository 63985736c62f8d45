#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use risk_journal::config::{Config, StorageBackend};
use risk_journal::error::{StorageError, StorageResult};
use risk_journal::models::{NewTrade, RiskProfile, Trade, TradeRecord};
use risk_journal::storage::{
    BackupTier, ConfigStore, MemoryConfigStore, MemoryTier, MemoryTradeStore,
    PlatformPersistence, TradeStore,
};

pub fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
        + Duration::seconds(secs)
}

pub fn test_config() -> Config {
    Config {
        storage_backend: StorageBackend::Memory,
        data_dir: std::env::temp_dir()
            .join("risk_journal_it")
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

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub fn temp_dir(tag: &str) -> std::path::PathBuf {
    let n = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "risk_journal_it_{}_{}_{}",
        tag,
        std::process::id(),
        n
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn injected(backend: &str) -> StorageError {
    StorageError::Write {
        backend: backend.to_string(),
        message: "injected failure".to_string(),
    }
}

/// Config store whose writes can be cut off, either right away or after a
/// number of successful saves.
pub struct FlakyConfigStore {
    inner: MemoryConfigStore,
    /// Remaining successful writes; negative means unlimited.
    writes_left: AtomicI64,
}

impl FlakyConfigStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryConfigStore::new(),
            writes_left: AtomicI64::new(-1),
        }
    }

    pub fn fail_writes(&self) {
        self.writes_left.store(0, Ordering::SeqCst);
    }

    pub fn fail_writes_after(&self, n: i64) {
        self.writes_left.store(n, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.writes_left.store(-1, Ordering::SeqCst);
    }

    fn take_write(&self) -> StorageResult<()> {
        let left = self.writes_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(injected("flaky-config"));
        }
        if left > 0 {
            self.writes_left.store(left - 1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FlakyConfigStore {
    fn name(&self) -> &str {
        "flaky-config"
    }

    async fn save_risk_settings(&self, profile: &RiskProfile) -> StorageResult<()> {
        self.take_write()?;
        self.inner.save_risk_settings(profile).await
    }

    async fn load_risk_settings(&self) -> StorageResult<Option<RiskProfile>> {
        self.inner.load_risk_settings().await
    }

    async fn clear_risk_settings(&self) -> StorageResult<()> {
        self.take_write()?;
        self.inner.clear_risk_settings().await
    }

    async fn has_risk_settings(&self) -> StorageResult<bool> {
        self.inner.has_risk_settings().await
    }
}

/// Trade store with switchable write failures and a slow-start option.
/// Import failures switch separately so a clear can succeed right before a
/// failing import.
pub struct FlakyTradeStore {
    inner: MemoryTradeStore,
    fail_writes: AtomicBool,
    fail_imports: AtomicBool,
    init_delay_ms: AtomicI64,
}

impl FlakyTradeStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryTradeStore::new(),
            fail_writes: AtomicBool::new(false),
            fail_imports: AtomicBool::new(false),
            init_delay_ms: AtomicI64::new(0),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_imports(&self, fail: bool) {
        self.fail_imports.store(fail, Ordering::SeqCst);
    }

    pub fn slow_init(&self, ms: i64) {
        self.init_delay_ms.store(ms, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("flaky-trades"));
        }
        Ok(())
    }
}

#[async_trait]
impl TradeStore for FlakyTradeStore {
    fn name(&self) -> &str {
        "flaky-trades"
    }

    async fn initialize_database(&self) -> StorageResult<()> {
        let ms = self.init_delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(ms as u64)).await;
        }
        self.inner.initialize_database().await
    }

    async fn get_all_trades(&self) -> StorageResult<Vec<Trade>> {
        self.inner.get_all_trades().await
    }

    async fn save_trade(&self, trade: NewTrade) -> StorageResult<Trade> {
        self.check()?;
        self.inner.save_trade(trade).await
    }

    async fn update_trade(&self, trade: &Trade) -> StorageResult<Trade> {
        self.check()?;
        self.inner.update_trade(trade).await
    }

    async fn delete_trade(&self, id: i64) -> StorageResult<()> {
        self.check()?;
        self.inner.delete_trade(id).await
    }

    async fn get_trade_by_id(&self, id: i64) -> StorageResult<Option<Trade>> {
        self.inner.get_trade_by_id(id).await
    }

    async fn clear_all_trades(&self) -> StorageResult<()> {
        self.check()?;
        self.inner.clear_all_trades().await
    }

    async fn get_trades_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Trade>> {
        self.inner.get_trades_by_date_range(start, end).await
    }

    async fn get_trades_count(&self) -> StorageResult<usize> {
        self.inner.get_trades_count().await
    }

    async fn get_recent_trades(&self, limit: usize) -> StorageResult<Vec<Trade>> {
        self.inner.get_recent_trades(limit).await
    }

    async fn export_trades(&self) -> StorageResult<Vec<TradeRecord>> {
        self.inner.export_trades().await
    }

    async fn import_trades(&self, records: &[TradeRecord]) -> StorageResult<usize> {
        self.check()?;
        if self.fail_imports.load(Ordering::SeqCst) {
            return Err(injected("flaky-trades"));
        }
        self.inner.import_trades(records).await
    }

    async fn close(&self) -> StorageResult<()> {
        self.inner.close().await
    }
}

/// Memory-backed platform whose every part can be broken on demand.
pub struct FaultyPlatform {
    pub config: Arc<FlakyConfigStore>,
    pub trades: Arc<FlakyTradeStore>,
    pub local: Arc<MemoryTier>,
    pub session: Arc<MemoryTier>,
}

impl FaultyPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(FlakyConfigStore::new()),
            trades: Arc::new(FlakyTradeStore::new()),
            local: Arc::new(MemoryTier::new("local")),
            session: Arc::new(MemoryTier::new("session")),
        })
    }
}

impl PlatformPersistence for FaultyPlatform {
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn config_store(&self) -> Arc<dyn ConfigStore> {
        self.config.clone()
    }

    fn trade_store(&self) -> Arc<dyn TradeStore> {
        self.trades.clone()
    }

    fn backup_tiers(&self) -> Vec<Arc<dyn BackupTier>> {
        vec![self.local.clone(), self.session.clone()]
    }
}
