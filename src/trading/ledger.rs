use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::{Error, Result, StorageError};
use crate::models::{NewTrade, Trade, TradeRecord};
use crate::storage::{with_retry, RetryPolicy, TradeStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingStatistics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percent of all trades that were profitable.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub average_win: f64,
    /// Mean of losing results, kept negative.
    pub average_loss: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub profit_factor: f64,
    /// Largest realized peak-to-trough fall of cumulative P&L.
    pub max_drawdown: f64,
}

impl TradingStatistics {
    pub fn from_trades(trades: &[Trade]) -> Self {
        if trades.is_empty() {
            return Self::default();
        }

        let wins: Vec<f64> = trades.iter().filter(|t| t.is_win()).map(|t| t.result).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| t.is_loss()).map(|t| t.result).collect();
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum();

        let profit_factor = if gross_loss < 0.0 {
            gross_profit / gross_loss.abs()
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        TradingStatistics {
            total_trades: trades.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: wins.len() as f64 / trades.len() as f64 * 100.0,
            total_pnl: total_pnl(trades),
            average_win: mean(&wins),
            average_loss: mean(&losses),
            best_trade: trades.iter().map(|t| t.result).fold(f64::NEG_INFINITY, f64::max),
            worst_trade: trades.iter().map(|t| t.result).fold(f64::INFINITY, f64::min),
            profit_factor,
            max_drawdown: peak_to_trough_drawdown(trades),
        }
    }
}

pub fn total_pnl(trades: &[Trade]) -> f64 {
    trades.iter().map(|t| t.result).sum()
}

/// Largest `peak - running` over the cumulative P&L path, starting flat.
pub fn peak_to_trough_drawdown(trades: &[Trade]) -> f64 {
    let mut running = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut worst = 0.0_f64;
    for t in trades {
        running += t.result;
        peak = peak.max(running);
        worst = worst.max(peak - running);
    }
    worst
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn repo_err(operation: &'static str, e: StorageError) -> Error {
    error!("Ledger {} failed: {}", operation, e);
    Error::repository(operation, e)
}

/// Ordered trade collection over a [`TradeStore`].
///
/// Reads are served from an in-memory cache that is filled from the store
/// on first access. `add` appends to a loaded cache once the store write
/// has succeeded; every other mutation drops the cache so the next read
/// rebuilds it. Mutations take `&mut self`, so a second mutation cannot
/// start while one is in flight.
pub struct TradeLedger {
    store: Arc<dyn TradeStore>,
    retry: RetryPolicy,
    cache: Option<Vec<Trade>>,
}

impl TradeLedger {
    pub fn new(store: Arc<dyn TradeStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            cache: None,
        }
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Cached trades, if the cache is warm. Never touches storage.
    pub fn cached(&self) -> Option<&[Trade]> {
        self.cache.as_deref()
    }

    async fn ensure_loaded(&mut self) -> Result<&[Trade]> {
        if self.cache.is_none() {
            let store = Arc::clone(&self.store);
            let trades = with_retry(&self.retry, "load trades", || store.get_all_trades())
                .await
                .map_err(|e| repo_err("load", e))?;
            debug!("Ledger cache rebuilt with {} trades", trades.len());
            self.cache = Some(trades);
        }
        Ok(self.cache.as_deref().unwrap_or(&[]))
    }

    pub async fn get_all(&mut self) -> Result<Vec<Trade>> {
        Ok(self.ensure_loaded().await?.to_vec())
    }

    pub async fn get_by_id(&mut self, id: i64) -> Result<Option<Trade>> {
        Ok(self.ensure_loaded().await?.iter().find(|t| t.id == id).cloned())
    }

    pub async fn add(&mut self, trade: NewTrade) -> Result<Trade> {
        let store = Arc::clone(&self.store);
        let saved = with_retry(&self.retry, "save trade", || store.save_trade(trade))
            .await
            .map_err(|e| repo_err("add", e))?;
        if let Some(cache) = self.cache.as_mut() {
            cache.push(saved.clone());
        }
        Ok(saved)
    }

    pub async fn update(&mut self, trade: &Trade) -> Result<Trade> {
        let store = Arc::clone(&self.store);
        let result = with_retry(&self.retry, "update trade", || store.update_trade(trade)).await;
        self.invalidate();
        result.map_err(|e| repo_err("update", e))
    }

    pub async fn delete(&mut self, id: i64) -> Result<()> {
        let store = Arc::clone(&self.store);
        let result = with_retry(&self.retry, "delete trade", || store.delete_trade(id)).await;
        self.invalidate();
        result.map_err(|e| repo_err("delete", e))
    }

    pub async fn clear_all(&mut self) -> Result<()> {
        let store = Arc::clone(&self.store);
        let result = with_retry(&self.retry, "clear trades", || store.clear_all_trades()).await;
        self.invalidate();
        result.map_err(|e| repo_err("clear", e))
    }

    /// Trades in `[start, end]`, straight from the store.
    pub async fn get_by_date_range(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Trade>> {
        if start > end {
            return Err(Error::Validation(format!(
                "date range start {} is after end {}",
                start, end
            )));
        }
        let store = Arc::clone(&self.store);
        with_retry(&self.retry, "trades by date", || {
            store.get_trades_by_date_range(start, end)
        })
        .await
        .map_err(|e| repo_err("date range", e))
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Trade>> {
        let store = Arc::clone(&self.store);
        with_retry(&self.retry, "recent trades", || store.get_recent_trades(limit))
            .await
            .map_err(|e| repo_err("recent", e))
    }

    pub async fn count(&self) -> Result<usize> {
        if let Some(cache) = &self.cache {
            return Ok(cache.len());
        }
        let store = Arc::clone(&self.store);
        with_retry(&self.retry, "count trades", || store.get_trades_count())
            .await
            .map_err(|e| repo_err("count", e))
    }

    pub async fn export_records(&self) -> Result<Vec<TradeRecord>> {
        let store = Arc::clone(&self.store);
        with_retry(&self.retry, "export trades", || store.export_trades())
            .await
            .map_err(|e| repo_err("export", e))
    }

    /// Bulk import; the store assigns fresh ids.
    pub async fn import_records(&mut self, records: &[TradeRecord]) -> Result<usize> {
        let store = Arc::clone(&self.store);
        let result = with_retry(&self.retry, "import trades", || store.import_trades(records)).await;
        self.invalidate();
        result.map_err(|e| repo_err("import", e))
    }

    // --- aggregates over the cache -----------------------------------------

    pub async fn statistics(&mut self) -> Result<TradingStatistics> {
        Ok(TradingStatistics::from_trades(self.ensure_loaded().await?))
    }

    pub async fn total_pnl(&mut self) -> Result<f64> {
        Ok(total_pnl(self.ensure_loaded().await?))
    }

    pub async fn max_drawdown(&mut self) -> Result<f64> {
        Ok(peak_to_trough_drawdown(self.ensure_loaded().await?))
    }

    pub async fn win_loss_counts(&mut self) -> Result<(usize, usize)> {
        let trades = self.ensure_loaded().await?;
        let wins = trades.iter().filter(|t| t.is_win()).count();
        let losses = trades.iter().filter(|t| t.is_loss()).count();
        Ok((wins, losses))
    }
}
