use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::models::{NewTrade, RiskProfile, Trade, TradeRecord};
use crate::storage::{filter_date_range, most_recent, BackupTier, ConfigStore, TradeStore};

/// Write to a sibling temp file, then rename over the target.
async fn write_atomic(path: &Path, contents: &str) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("tmp");
    async_fs::write(&tmp, contents).await?;
    async_fs::rename(&tmp, path).await?;
    Ok(())
}

async fn read_optional(path: &Path) -> StorageResult<Option<String>> {
    match async_fs::read_to_string(path).await {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

async fn remove_if_exists(path: &Path) -> StorageResult<()> {
    match async_fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Settings record in a single JSON file.
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ConfigStore for JsonFileConfigStore {
    fn name(&self) -> &str {
        "file-config"
    }

    async fn save_risk_settings(&self, profile: &RiskProfile) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(profile)?;
        write_atomic(&self.path, &json).await
    }

    async fn load_risk_settings(&self) -> StorageResult<Option<RiskProfile>> {
        let Some(content) = read_optional(&self.path).await? else {
            return Ok(None);
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                backend: self.path.display().to_string(),
                message: e.to_string(),
            })
    }

    async fn clear_risk_settings(&self) -> StorageResult<()> {
        remove_if_exists(&self.path).await
    }

    async fn has_risk_settings(&self) -> StorageResult<bool> {
        Ok(async_fs::try_exists(&self.path).await?)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TradeFile {
    next_id: i64,
    trades: Vec<Trade>,
}

/// Trade table kept as one JSON document, rewritten on every mutation.
/// The document is loaded once and then served from memory.
pub struct JsonFileTradeStore {
    path: PathBuf,
    table: Mutex<Option<TradeFile>>,
}

impl JsonFileTradeStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            table: Mutex::new(None),
        }
    }

    async fn load(&self) -> StorageResult<TradeFile> {
        match read_optional(&self.path).await? {
            Some(content) => serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                backend: self.path.display().to_string(),
                message: e.to_string(),
            }),
            None => Ok(TradeFile::default()),
        }
    }

    async fn persist(&self, table: &TradeFile) -> StorageResult<()> {
        let json = serde_json::to_string(table)?;
        write_atomic(&self.path, &json).await
    }

    async fn loaded<'a>(
        &self,
        guard: &'a mut Option<TradeFile>,
    ) -> StorageResult<&'a mut TradeFile> {
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        guard
            .as_mut()
            .ok_or_else(|| StorageError::Unavailable(self.name().to_string()))
    }

    async fn read_table<T>(&self, f: impl FnOnce(&TradeFile) -> T) -> StorageResult<T> {
        let mut guard = self.table.lock().await;
        let table = self.loaded(&mut guard).await?;
        Ok(f(table))
    }

    /// Apply `f` to a copy of the table and write the copy out. The cached
    /// table is replaced only once the file write has succeeded, so a failed
    /// or retried write leaves no trace.
    async fn write_table<T>(
        &self,
        f: impl FnOnce(&mut TradeFile) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut guard = self.table.lock().await;
        let table = self.loaded(&mut guard).await?;
        let mut draft = table.clone();
        let out = f(&mut draft)?;
        self.persist(&draft).await?;
        *table = draft;
        Ok(out)
    }
}

fn insert(table: &mut TradeFile, trade: NewTrade) -> Trade {
    table.next_id += 1;
    let stored = Trade {
        id: table.next_id,
        result: trade.result,
        timestamp: trade.timestamp,
    };
    table.trades.push(stored.clone());
    stored
}

#[async_trait]
impl TradeStore for JsonFileTradeStore {
    fn name(&self) -> &str {
        "file-trades"
    }

    async fn initialize_database(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Initialize {
                    backend: self.name().to_string(),
                    message: e.to_string(),
                })?;
        }
        let loaded = self.load().await?;
        info!(
            "Opened trade store {:?} ({} trades)",
            self.path,
            loaded.trades.len()
        );
        *self.table.lock().await = Some(loaded);
        Ok(())
    }

    async fn get_all_trades(&self) -> StorageResult<Vec<Trade>> {
        self.read_table(|t| t.trades.clone()).await
    }

    async fn save_trade(&self, trade: NewTrade) -> StorageResult<Trade> {
        self.write_table(|t| Ok(insert(t, trade))).await
    }

    async fn update_trade(&self, trade: &Trade) -> StorageResult<Trade> {
        self.write_table(|t| {
            let slot = t
                .trades
                .iter_mut()
                .find(|x| x.id == trade.id)
                .ok_or(StorageError::TradeNotFound(trade.id))?;
            *slot = trade.clone();
            Ok(trade.clone())
        })
        .await
    }

    async fn delete_trade(&self, id: i64) -> StorageResult<()> {
        self.write_table(|t| {
            let before = t.trades.len();
            t.trades.retain(|x| x.id != id);
            if t.trades.len() == before {
                return Err(StorageError::TradeNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn get_trade_by_id(&self, id: i64) -> StorageResult<Option<Trade>> {
        self.read_table(|t| t.trades.iter().find(|x| x.id == id).cloned())
            .await
    }

    async fn clear_all_trades(&self) -> StorageResult<()> {
        self.write_table(|t| {
            t.trades.clear();
            Ok(())
        })
        .await
    }

    async fn get_trades_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Trade>> {
        self.read_table(|t| filter_date_range(&t.trades, start, end))
            .await
    }

    async fn get_trades_count(&self) -> StorageResult<usize> {
        self.read_table(|t| t.trades.len()).await
    }

    async fn get_recent_trades(&self, limit: usize) -> StorageResult<Vec<Trade>> {
        self.read_table(|t| most_recent(&t.trades, limit)).await
    }

    async fn export_trades(&self) -> StorageResult<Vec<TradeRecord>> {
        self.read_table(|t| t.trades.iter().map(Trade::to_record).collect())
            .await
    }

    async fn import_trades(&self, records: &[TradeRecord]) -> StorageResult<usize> {
        self.write_table(|t| {
            for record in records {
                insert(t, record.to_new_trade());
            }
            Ok(records.len())
        })
        .await
    }

    async fn close(&self) -> StorageResult<()> {
        let mut guard = self.table.lock().await;
        if let Some(table) = guard.as_ref() {
            self.persist(table).await?;
        }
        *guard = None;
        debug!("Closed trade store {:?}", self.path);
        Ok(())
    }
}

/// Backup tier backed by a directory, one `<key>.json` file per key.
pub struct FileTier {
    name: String,
    dir: PathBuf,
}

impl FileTier {
    pub fn new(name: &str, dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.to_string(),
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl BackupTier for FileTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        // a missing directory is created on first write
        match async_fs::metadata(&self.dir).await {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(e) => e.kind() == std::io::ErrorKind::NotFound,
        }
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        read_optional(&self.key_path(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        write_atomic(&self.key_path(key), value)
            .await
            .map_err(|e| StorageError::Write {
                backend: self.name.clone(),
                message: e.to_string(),
            })
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        remove_if_exists(&self.key_path(key)).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let mut entries = match async_fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if let Some(key) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
            {
                keys.push(key.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{temp_dir, ts};

    #[tokio::test]
    async fn settings_survive_reopen() {
        let dir = temp_dir("file_settings");
        let path = dir.join("settings.json");
        let profile = RiskProfile::new(10_000.0, 500.0, 5.0, true).unwrap();

        let store = JsonFileConfigStore::new(&path);
        assert!(!store.has_risk_settings().await.unwrap());
        store.save_risk_settings(&profile).await.unwrap();

        let reopened = JsonFileConfigStore::new(&path);
        assert!(reopened.has_risk_settings().await.unwrap());
        assert_eq!(reopened.load_risk_settings().await.unwrap(), Some(profile));

        reopened.clear_risk_settings().await.unwrap();
        assert_eq!(reopened.load_risk_settings().await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_settings_reported() {
        let dir = temp_dir("file_corrupt");
        let path = dir.join("settings.json");
        async_fs::create_dir_all(&dir).await.unwrap();
        async_fs::write(&path, "{not json").await.unwrap();

        let store = JsonFileConfigStore::new(&path);
        assert!(matches!(
            store.load_risk_settings().await,
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn trades_persist_with_id_counter() {
        let dir = temp_dir("file_trades");
        let path = dir.join("trades.json");

        let store = JsonFileTradeStore::new(&path);
        store.initialize_database().await.unwrap();
        let a = store.save_trade(NewTrade::at(-20.0, ts(0))).await.unwrap();
        store.save_trade(NewTrade::at(35.0, ts(60))).await.unwrap();
        store.delete_trade(a.id).await.unwrap();
        store.close().await.unwrap();

        let reopened = JsonFileTradeStore::new(&path);
        reopened.initialize_database().await.unwrap();
        let all = reopened.get_all_trades().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, 2);
        let next = reopened.save_trade(NewTrade::at(1.0, ts(120))).await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn failed_write_leaves_table_untouched() {
        let dir = temp_dir("file_write_fail");
        let path = dir.join("trades.json");
        let store = JsonFileTradeStore::new(&path);
        store.initialize_database().await.unwrap();
        store.save_trade(NewTrade::at(7.0, ts(0))).await.unwrap();

        // a directory where the temp file goes makes every write fail
        async_fs::create_dir_all(path.with_extension("tmp")).await.unwrap();
        for _ in 0..3 {
            assert!(store.save_trade(NewTrade::at(-10.0, ts(60))).await.is_err());
        }
        assert!(store.clear_all_trades().await.is_err());
        assert!(store
            .import_trades(&[TradeRecord { id: None, result: 1.0, timestamp: ts(1) }])
            .await
            .is_err());

        let all = store.get_all_trades().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].result, 7.0);

        async_fs::remove_dir(path.with_extension("tmp")).await.unwrap();
        let next = store.save_trade(NewTrade::at(5.0, ts(120))).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[tokio::test]
    async fn tier_lists_keys() {
        let dir = temp_dir("file_tier");
        let tier = FileTier::new("backup", dir.join("backup"));
        assert!(tier.is_available().await);
        tier.set("b", "2").await.unwrap();
        tier.set("a", "1").await.unwrap();
        assert_eq!(tier.keys().await.unwrap(), vec!["a", "b"]);
        assert_eq!(tier.get("a").await.unwrap().as_deref(), Some("1"));
        tier.remove("a").await.unwrap();
        assert_eq!(tier.get("a").await.unwrap(), None);
    }
}
