use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

use crate::error::{StorageError, StorageResult};
use crate::models::{NewTrade, RiskProfile, Trade, TradeRecord};
use crate::storage::{filter_date_range, most_recent, BackupTier, ConfigStore, TradeStore};

/// Settings held in process memory only.
#[derive(Default)]
pub struct MemoryConfigStore {
    settings: RwLock<Option<RiskProfile>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    fn name(&self) -> &str {
        "memory-config"
    }

    async fn save_risk_settings(&self, profile: &RiskProfile) -> StorageResult<()> {
        *self.settings.write().await = Some(*profile);
        Ok(())
    }

    async fn load_risk_settings(&self) -> StorageResult<Option<RiskProfile>> {
        Ok(*self.settings.read().await)
    }

    async fn clear_risk_settings(&self) -> StorageResult<()> {
        *self.settings.write().await = None;
        Ok(())
    }

    async fn has_risk_settings(&self) -> StorageResult<bool> {
        Ok(self.settings.read().await.is_some())
    }
}

#[derive(Default)]
struct TradeTable {
    trades: Vec<Trade>,
    next_id: i64,
}

impl TradeTable {
    fn insert(&mut self, trade: NewTrade) -> Trade {
        self.next_id += 1;
        let stored = Trade {
            id: self.next_id,
            result: trade.result,
            timestamp: trade.timestamp,
        };
        self.trades.push(stored.clone());
        stored
    }
}

/// Trade table held in process memory. Ids start at 1 and are never reused.
#[derive(Default)]
pub struct MemoryTradeStore {
    table: Mutex<TradeTable>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    fn name(&self) -> &str {
        "memory-trades"
    }

    async fn initialize_database(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn get_all_trades(&self) -> StorageResult<Vec<Trade>> {
        Ok(self.table.lock().await.trades.clone())
    }

    async fn save_trade(&self, trade: NewTrade) -> StorageResult<Trade> {
        Ok(self.table.lock().await.insert(trade))
    }

    async fn update_trade(&self, trade: &Trade) -> StorageResult<Trade> {
        let mut table = self.table.lock().await;
        let slot = table
            .trades
            .iter_mut()
            .find(|t| t.id == trade.id)
            .ok_or(StorageError::TradeNotFound(trade.id))?;
        *slot = trade.clone();
        Ok(trade.clone())
    }

    async fn delete_trade(&self, id: i64) -> StorageResult<()> {
        let mut table = self.table.lock().await;
        let before = table.trades.len();
        table.trades.retain(|t| t.id != id);
        if table.trades.len() == before {
            return Err(StorageError::TradeNotFound(id));
        }
        Ok(())
    }

    async fn get_trade_by_id(&self, id: i64) -> StorageResult<Option<Trade>> {
        let table = self.table.lock().await;
        Ok(table.trades.iter().find(|t| t.id == id).cloned())
    }

    async fn clear_all_trades(&self) -> StorageResult<()> {
        self.table.lock().await.trades.clear();
        Ok(())
    }

    async fn get_trades_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<Trade>> {
        let table = self.table.lock().await;
        Ok(filter_date_range(&table.trades, start, end))
    }

    async fn get_trades_count(&self) -> StorageResult<usize> {
        Ok(self.table.lock().await.trades.len())
    }

    async fn get_recent_trades(&self, limit: usize) -> StorageResult<Vec<Trade>> {
        let table = self.table.lock().await;
        Ok(most_recent(&table.trades, limit))
    }

    async fn export_trades(&self) -> StorageResult<Vec<TradeRecord>> {
        let table = self.table.lock().await;
        Ok(table.trades.iter().map(Trade::to_record).collect())
    }

    async fn import_trades(&self, records: &[TradeRecord]) -> StorageResult<usize> {
        let mut table = self.table.lock().await;
        for record in records {
            table.insert(record.to_new_trade());
        }
        Ok(records.len())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// In-memory key-value tier. Can be switched off to behave like a storage
/// area the host refuses to open (private browsing, quota exhaustion).
pub struct MemoryTier {
    name: String,
    available: AtomicBool,
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryTier {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: AtomicBool::new(true),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Drop everything, as when a session-scoped area ends.
    pub async fn wipe(&self) {
        self.entries.write().await.clear();
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(self.name.clone()))
        }
    }
}

#[async_trait]
impl BackupTier for MemoryTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.ensure_available()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.ensure_available()?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.ensure_available()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.ensure_available()?;
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ts;

    #[tokio::test]
    async fn store_assigns_increasing_ids() {
        let store = MemoryTradeStore::new();
        let a = store.save_trade(NewTrade::at(10.0, ts(0))).await.unwrap();
        let b = store.save_trade(NewTrade::at(-5.0, ts(1))).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        store.delete_trade(a.id).await.unwrap();
        let c = store.save_trade(NewTrade::at(1.0, ts(2))).await.unwrap();
        assert_eq!(c.id, 3);
        assert_eq!(store.get_trades_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn update_and_delete_missing_trade_fail() {
        let store = MemoryTradeStore::new();
        let ghost = Trade {
            id: 42,
            result: 1.0,
            timestamp: ts(0),
        };
        assert!(matches!(
            store.update_trade(&ghost).await,
            Err(StorageError::TradeNotFound(42))
        ));
        assert!(store.delete_trade(42).await.is_err());
    }

    #[tokio::test]
    async fn date_range_and_recent() {
        let store = MemoryTradeStore::new();
        for i in 0..5 {
            store
                .save_trade(NewTrade::at(i as f64, ts(i * 60)))
                .await
                .unwrap();
        }
        let mid = store
            .get_trades_by_date_range(ts(60), ts(180))
            .await
            .unwrap();
        assert_eq!(mid.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2, 3, 4]);

        let recent = store.get_recent_trades(2).await.unwrap();
        assert_eq!(recent.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[tokio::test]
    async fn import_reassigns_ids() {
        let store = MemoryTradeStore::new();
        let records = vec![
            TradeRecord {
                id: Some(100),
                result: 5.0,
                timestamp: ts(0),
            },
            TradeRecord {
                id: None,
                result: -3.0,
                timestamp: ts(1),
            },
        ];
        assert_eq!(store.import_trades(&records).await.unwrap(), 2);
        let all = store.get_all_trades().await.unwrap();
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn unavailable_tier_refuses_io() {
        let tier = MemoryTier::new("session");
        tier.set("k", "v").await.unwrap();
        tier.set_available(false);
        assert!(!tier.is_available().await);
        assert!(matches!(tier.get("k").await, Err(StorageError::Unavailable(_))));
        tier.set_available(true);
        assert_eq!(tier.get("k").await.unwrap().as_deref(), Some("v"));
        tier.wipe().await;
        assert!(tier.keys().await.unwrap().is_empty());
    }
}
