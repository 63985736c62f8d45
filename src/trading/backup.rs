use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::core::DrawdownSeriesCalculator;
use crate::error::{Error, Result, StorageError};
use crate::models::{RiskProfile, Trade, TradeRecord};
use crate::storage::{with_retry, BackupTier, ConfigStore, RetryPolicy, TradeStore};
use crate::trading::ledger::TradeLedger;

/// Key of the full snapshot (settings + trades) in every tier.
pub const BACKUP_KEY: &str = "risk_journal_backup";
/// Key of the settings-only record in every tier.
pub const SETTINGS_KEY: &str = "risk_journal_settings";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub risk_settings: RiskProfile,
    pub trades: Vec<TradeRecord>,
}

impl BackupSnapshot {
    pub fn new(version: &str, profile: &RiskProfile, trades: &[Trade]) -> Self {
        Self {
            version: version.to_string(),
            timestamp: Utc::now(),
            risk_settings: *profile,
            trades: trades.iter().map(Trade::to_record).collect(),
        }
    }

    /// Parsed is not enough: numbers must be usable before anything is
    /// restored from a snapshot.
    pub fn is_structurally_valid(&self) -> bool {
        let s = &self.risk_settings;
        let settings_ok = [
            s.max_drawdown,
            s.loss_per_trade_percentage,
            s.account_balance,
            s.current_balance,
            s.current_drawdown_threshold,
        ]
        .iter()
        .all(|v| v.is_finite())
            && s.account_balance >= 0.0
            && s.max_drawdown >= 0.0;

        settings_ok && self.trades.iter().all(|t| t.result.is_finite())
    }
}

/// Settings-only record written next to the full snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsBackup {
    version: String,
    timestamp: DateTime<Utc>,
    risk_settings: RiskProfile,
}

impl From<SettingsBackup> for BackupSnapshot {
    fn from(s: SettingsBackup) -> Self {
        BackupSnapshot {
            version: s.version,
            timestamp: s.timestamp,
            risk_settings: s.risk_settings,
            trades: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackupOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BackupOutcome {
    pub fn is_partial(&self) -> bool {
        !self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredSnapshot {
    pub snapshot: BackupSnapshot,
    /// `tier/key` the snapshot came from, or `merged`.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStatus {
    pub name: String,
    pub available: bool,
    pub key_count: usize,
    pub has_data: bool,
    pub has_full_backup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartupReport {
    pub has_settings: bool,
    pub trade_count: usize,
    pub tiers: Vec<TierStatus>,
}

impl StartupReport {
    pub fn primary_is_empty(&self) -> bool {
        !self.has_settings && self.trade_count == 0
    }

    pub fn any_backup(&self) -> bool {
        self.tiers.iter().any(|t| t.has_data)
    }
}

/// Mirrors state into every backup tier and reads it back when the primary
/// stores come up empty or broken.
pub struct BackupRecoveryManager {
    tiers: Vec<Arc<dyn BackupTier>>,
    config_store: Arc<dyn ConfigStore>,
    trade_store: Arc<dyn TradeStore>,
    version: String,
    retry: RetryPolicy,
}

impl BackupRecoveryManager {
    pub fn new(
        tiers: Vec<Arc<dyn BackupTier>>,
        config_store: Arc<dyn ConfigStore>,
        trade_store: Arc<dyn TradeStore>,
        version: &str,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            tiers,
            config_store,
            trade_store,
            version: version.to_string(),
            retry,
        }
    }

    pub fn tier_names(&self) -> Vec<String> {
        self.tiers.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Drop both backup keys from every reachable tier. Best effort.
    pub async fn clear_backups(&self) {
        for tier in &self.tiers {
            if !tier.is_available().await {
                continue;
            }
            for key in [BACKUP_KEY, SETTINGS_KEY] {
                if let Err(e) = tier.remove(key).await {
                    warn!("Could not remove {} from {}: {}", key, tier.name(), e);
                }
            }
        }
    }

    /// Write the snapshot into every tier concurrently. Succeeds when at
    /// least one tier took the full snapshot.
    pub async fn force_save_data(
        &self,
        profile: &RiskProfile,
        trades: &[Trade],
    ) -> Result<BackupOutcome> {
        let snapshot = BackupSnapshot::new(&self.version, profile, trades);
        let settings = SettingsBackup {
            version: snapshot.version.clone(),
            timestamp: snapshot.timestamp,
            risk_settings: *profile,
        };
        let snapshot_json = serde_json::to_string(&snapshot).map_err(StorageError::from)?;
        let settings_json = serde_json::to_string(&settings).map_err(StorageError::from)?;

        let mut set = JoinSet::new();
        for (idx, tier) in self.tiers.iter().enumerate() {
            let tier = Arc::clone(tier);
            let snapshot_json = snapshot_json.clone();
            let settings_json = settings_json.clone();
            let retry = self.retry;
            set.spawn(async move {
                let name = tier.name().to_string();
                let full = with_retry(&retry, "backup write", || tier.set(BACKUP_KEY, &snapshot_json)).await;
                if full.is_ok() {
                    // the settings record is a convenience copy; its failure
                    // does not fail the tier
                    if let Err(e) = tier.set(SETTINGS_KEY, &settings_json).await {
                        debug!("Settings record not written to {}: {}", name, e);
                    }
                }
                (idx, name, full)
            });
        }

        let mut results = Vec::with_capacity(self.tiers.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(r) => results.push(r),
                Err(e) => error!("Backup task aborted: {}", e),
            }
        }
        results.sort_by_key(|(idx, _, _)| *idx);

        let mut outcome = BackupOutcome::default();
        for (_, name, result) in results {
            match result {
                Ok(()) => outcome.succeeded.push(name),
                Err(e) => {
                    warn!("Backup to tier {} failed: {}", name, e);
                    outcome.failed.push((name, e.to_string()));
                }
            }
        }

        if outcome.succeeded.is_empty() {
            error!("Backup failed on every tier ({} attempted)", self.tiers.len());
            return Err(Error::Storage(StorageError::AllTiersFailed {
                attempted: self.tiers.len(),
            }));
        }

        debug!(
            "Backup written to {} tier(s), {} trades",
            outcome.succeeded.len(),
            snapshot.trades.len()
        );
        Ok(outcome)
    }

    async fn read_full(&self, tier: &dyn BackupTier) -> Option<BackupSnapshot> {
        let raw = match tier.get(BACKUP_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Reading backup from {} failed: {}", tier.name(), e);
                return None;
            }
        };
        match serde_json::from_str::<BackupSnapshot>(&raw) {
            Ok(s) if s.is_structurally_valid() => Some(s),
            Ok(_) => {
                warn!("Backup in {} has unusable values, skipping", tier.name());
                None
            }
            Err(e) => {
                warn!("Backup in {} is corrupt: {}", tier.name(), e);
                None
            }
        }
    }

    async fn read_settings(&self, tier: &dyn BackupTier) -> Option<BackupSnapshot> {
        let raw = tier.get(SETTINGS_KEY).await.ok().flatten()?;
        match serde_json::from_str::<SettingsBackup>(&raw) {
            Ok(s) => Some(BackupSnapshot::from(s)).filter(BackupSnapshot::is_structurally_valid),
            Err(e) => {
                warn!("Settings record in {} is corrupt: {}", tier.name(), e);
                None
            }
        }
    }

    /// First valid snapshot in priority order. Every tier is probed for a
    /// full snapshot before any settings-only record is considered. A
    /// settings-only result carries no trades, so its running balance is
    /// reset to the account balance.
    pub async fn try_recover_data(&self) -> Result<Option<RecoveredSnapshot>> {
        let mut available = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            if tier.is_available().await {
                available.push(tier);
            } else {
                info!("Backup tier {} unavailable, skipping", tier.name());
            }
        }

        for tier in &available {
            if let Some(snapshot) = self.read_full(tier.as_ref()).await {
                info!(
                    "Found backup in {} from {} ({} trades)",
                    tier.name(),
                    snapshot.timestamp.to_rfc3339(),
                    snapshot.trades.len()
                );
                return Ok(Some(RecoveredSnapshot {
                    snapshot,
                    source: format!("{}/{}", tier.name(), BACKUP_KEY),
                }));
            }
        }
        for tier in &available {
            if let Some(mut snapshot) = self.read_settings(tier.as_ref()).await {
                info!("Found settings-only backup in {}", tier.name());
                snapshot.risk_settings = snapshot.risk_settings.with_balance_reset();
                return Ok(Some(RecoveredSnapshot {
                    snapshot,
                    source: format!("{}/{}", tier.name(), SETTINGS_KEY),
                }));
            }
        }
        info!("No recoverable data found in {} tier(s)", self.tiers.len());
        Ok(None)
    }

    /// Every valid snapshot across all tiers. Full snapshots come first,
    /// settings-only records after them.
    pub async fn collect_snapshots(&self) -> Vec<BackupSnapshot> {
        let mut full = Vec::new();
        let mut settings_only = Vec::new();
        for tier in &self.tiers {
            if !tier.is_available().await {
                continue;
            }
            if let Some(s) = self.read_full(tier.as_ref()).await {
                full.push(s);
            }
            if let Some(s) = self.read_settings(tier.as_ref()).await {
                settings_only.push(s);
            }
        }
        full.extend(settings_only);
        full
    }

    /// Combine several snapshots: the newest one supplies the settings (ties
    /// keep input order) and trade lists are unioned on `(timestamp, result)`.
    /// Running balance and trailing threshold are rebuilt from the merged
    /// trades.
    pub fn merge_backup_data(mut sources: Vec<BackupSnapshot>) -> Option<BackupSnapshot> {
        sources.retain(BackupSnapshot::is_structurally_valid);
        sources.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let mut iter = sources.into_iter();
        let mut base = iter.next()?;

        let mut seen: HashSet<(i64, u64)> = base.trades.iter().map(TradeRecord::dedup_key).collect();
        for other in iter {
            for trade in other.trades {
                if seen.insert(trade.dedup_key()) {
                    base.trades.push(trade);
                }
            }
        }
        base.trades.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        let results: Vec<f64> = base.trades.iter().map(|t| t.result).collect();
        let rebuilt = base
            .risk_settings
            .with_balance_reset()
            .update_balance(results.iter().sum());
        let floor = DrawdownSeriesCalculator::for_profile(&rebuilt).final_floor(&results);
        base.risk_settings = rebuilt.with_drawdown_threshold(floor);
        Some(base)
    }

    /// Replace ledger and settings with the snapshot's content. Trades get
    /// new identities from the store.
    pub async fn restore_data(
        &self,
        snapshot: &BackupSnapshot,
        ledger: &mut TradeLedger,
    ) -> Result<RiskProfile> {
        if !snapshot.is_structurally_valid() {
            return Err(Error::Validation("snapshot contains unusable values".into()));
        }
        if snapshot.risk_settings.is_configured() {
            snapshot.risk_settings.validate()?;
        }

        ledger.clear_all().await?;
        let imported = ledger.import_records(&snapshot.trades).await?;

        let profile = snapshot.risk_settings;
        let store = Arc::clone(&self.config_store);
        with_retry(&self.retry, "restore settings", || store.save_risk_settings(&profile))
            .await?;

        info!(
            "Restored {} trades and settings from backup dated {}",
            imported,
            snapshot.timestamp.to_rfc3339()
        );
        Ok(profile)
    }

    /// Read-only status of primary stores and every tier.
    pub async fn check_startup_data(&self) -> StartupReport {
        let has_settings = self.config_store.has_risk_settings().await.unwrap_or(false);
        let trade_count = self.trade_store.get_trades_count().await.unwrap_or(0);

        let mut tiers = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            let available = tier.is_available().await;
            let keys = if available {
                tier.keys().await.unwrap_or_default()
            } else {
                Vec::new()
            };
            let has_full_backup = keys.iter().any(|k| k == BACKUP_KEY);
            let has_data = has_full_backup || keys.iter().any(|k| k == SETTINGS_KEY);
            tiers.push(TierStatus {
                name: tier.name().to_string(),
                available,
                key_count: keys.len(),
                has_data,
                has_full_backup,
            });
        }

        StartupReport {
            has_settings,
            trade_count,
            tiers,
        }
    }
}
