use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::storage::{
    BackupTier, ConfigStore, FileTier, JsonFileConfigStore, JsonFileTradeStore, MemoryConfigStore,
    MemoryTier, MemoryTradeStore, TradeStore,
};

/// The set of storage backends for one runtime target. Exactly one
/// implementation is picked at startup and handed to the coordinator.
pub trait PlatformPersistence: Send + Sync {
    fn name(&self) -> &'static str;
    fn config_store(&self) -> Arc<dyn ConfigStore>;
    fn trade_store(&self) -> Arc<dyn TradeStore>;
    /// Backup tiers in recovery priority order.
    fn backup_tiers(&self) -> Vec<Arc<dyn BackupTier>>;
}

pub struct MemoryPlatform {
    config: Arc<MemoryConfigStore>,
    trades: Arc<MemoryTradeStore>,
    local: Arc<MemoryTier>,
    session: Arc<MemoryTier>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MemoryConfigStore::new()),
            trades: Arc::new(MemoryTradeStore::new()),
            local: Arc::new(MemoryTier::new("local")),
            session: Arc::new(MemoryTier::new("session")),
        }
    }

    pub fn local_tier(&self) -> Arc<MemoryTier> {
        Arc::clone(&self.local)
    }

    pub fn session_tier(&self) -> Arc<MemoryTier> {
        Arc::clone(&self.session)
    }
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPersistence for MemoryPlatform {
    fn name(&self) -> &'static str {
        "memory"
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

/// JSON files under a data directory:
///
/// ```text
/// <data_dir>/settings.json
/// <data_dir>/trades.json
/// <data_dir>/backup/    persistent backup tier
/// <data_dir>/session/   session tier, wiped by `end_session`
/// ```
pub struct FilePlatform {
    data_dir: PathBuf,
    config: Arc<JsonFileConfigStore>,
    trades: Arc<JsonFileTradeStore>,
    backup: Arc<FileTier>,
    session: Arc<FileTier>,
}

impl FilePlatform {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        Self {
            config: Arc::new(JsonFileConfigStore::new(data_dir.join("settings.json"))),
            trades: Arc::new(JsonFileTradeStore::new(data_dir.join("trades.json"))),
            backup: Arc::new(FileTier::new("backup", data_dir.join("backup"))),
            session: Arc::new(FileTier::new("session", data_dir.join("session"))),
            data_dir,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Remove the session-scoped tier.
    pub async fn end_session(&self) -> StorageResult<()> {
        match tokio::fs::remove_dir_all(self.session.dir()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

impl PlatformPersistence for FilePlatform {
    fn name(&self) -> &'static str {
        "file"
    }

    fn config_store(&self) -> Arc<dyn ConfigStore> {
        self.config.clone()
    }

    fn trade_store(&self) -> Arc<dyn TradeStore> {
        self.trades.clone()
    }

    fn backup_tiers(&self) -> Vec<Arc<dyn BackupTier>> {
        vec![self.backup.clone(), self.session.clone()]
    }
}

pub fn select_platform(cfg: &Config) -> Arc<dyn PlatformPersistence> {
    let platform: Arc<dyn PlatformPersistence> = match cfg.storage_backend {
        StorageBackend::File => Arc::new(FilePlatform::new(&cfg.data_dir)),
        StorageBackend::Memory => Arc::new(MemoryPlatform::new()),
    };
    info!(
        "Storage platform: {} ({} backup tiers)",
        platform.name(),
        platform.backup_tiers().len()
    );
    platform
}
