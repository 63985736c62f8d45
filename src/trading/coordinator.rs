use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::{DrawdownPoint, DrawdownSeriesCalculator, TradeGate};
use crate::error::{Error, Result, StorageError};
use crate::models::{NewTrade, RiskProfile, Trade};
use crate::storage::{with_retry, ConfigStore, PlatformPersistence, RetryPolicy};
use crate::trading::backup::{
    BackupOutcome, BackupRecoveryManager, BackupSnapshot, StartupReport,
};
use crate::trading::ledger::{TradeLedger, TradingStatistics};
use crate::trading::transfer::ExportFile;

const WARNING_USED_PCT: f64 = 50.0;
const DANGER_USED_PCT: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Warning,
    Danger,
    Breached,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Safe => write!(f, "safe"),
            RiskLevel::Warning => write!(f, "warning"),
            RiskLevel::Danger => write!(f, "danger"),
            RiskLevel::Breached => write!(f, "breached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskStatus {
    pub account_balance: f64,
    pub current_balance: f64,
    pub effective_max_drawdown: f64,
    pub current_drawdown: f64,
    pub remaining_capacity: f64,
    pub max_loss_per_trade: f64,
    pub drawdown_used_pct: f64,
    pub is_dynamic: bool,
    pub level: RiskLevel,
}

impl RiskStatus {
    pub fn from_profile(p: &RiskProfile) -> Self {
        let used = p.drawdown_used_pct();
        let level = if p.remaining_risk_capacity() <= 0.0 && p.current_drawdown_amount() > 0.0 {
            RiskLevel::Breached
        } else if used >= DANGER_USED_PCT {
            RiskLevel::Danger
        } else if used >= WARNING_USED_PCT {
            RiskLevel::Warning
        } else {
            RiskLevel::Safe
        };

        RiskStatus {
            account_balance: p.account_balance,
            current_balance: p.current_balance,
            effective_max_drawdown: p.effective_max_drawdown(),
            current_drawdown: p.current_drawdown_amount(),
            remaining_capacity: p.remaining_risk_capacity(),
            max_loss_per_trade: p.max_loss_per_trade(),
            drawdown_used_pct: used,
            is_dynamic: p.is_dynamic_max_drawdown,
            level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeKind {
    TradeAdded,
    TradeUpdated,
    TradeDeleted,
    SettingsChanged,
    TradesCleared,
    Reset,
    Restored,
}

#[derive(Debug, Clone)]
pub struct StateChange {
    pub kind: ChangeKind,
    pub status: RiskStatus,
    pub statistics: TradingStatistics,
    pub trade_count: usize,
}

pub type Listener = Box<dyn Fn(&StateChange) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// Primary stores had data.
    Loaded { trades: usize },
    /// Primary stores were empty and a backup was restored.
    Recovered { source: String, trades: usize },
    /// Primary stores were empty and automatic recovery is switched off.
    FreshStart,
    /// Primary stores were empty and no tier held a usable snapshot.
    NoRecoverableData,
}

/// Read side refreshed after each mutation.
#[derive(Debug, Clone, Default)]
struct StateView {
    trades: Vec<Trade>,
    statistics: TradingStatistics,
}

/// Runs every user-visible mutation as validate, persist settings, persist
/// trades, mirror to backups, refresh. The in-memory profile only moves
/// once both primary writes have landed.
pub struct PersistenceCoordinator {
    platform: Arc<dyn PlatformPersistence>,
    config_store: Arc<dyn ConfigStore>,
    ledger: TradeLedger,
    backup: BackupRecoveryManager,
    retry: RetryPolicy,
    profile: RiskProfile,
    view: StateView,
    listeners: Vec<Listener>,
    last_error: Option<String>,
    last_backup: Option<BackupOutcome>,
    unsaved: bool,
    recovery_attempted: bool,
}

impl PersistenceCoordinator {
    pub fn new(platform: Arc<dyn PlatformPersistence>, cfg: &Config) -> Self {
        let retry = cfg.retry_policy();
        let config_store = platform.config_store();
        let trade_store = platform.trade_store();
        let backup = BackupRecoveryManager::new(
            platform.backup_tiers(),
            Arc::clone(&config_store),
            Arc::clone(&trade_store),
            &cfg.backup_version,
            retry,
        );

        Self {
            ledger: TradeLedger::new(trade_store, retry),
            config_store,
            backup,
            retry,
            platform,
            profile: RiskProfile::default(),
            view: StateView::default(),
            listeners: Vec::new(),
            last_error: None,
            last_backup: None,
            unsaved: false,
            recovery_attempted: false,
        }
    }

    /// Open storage, load state, and run the one automatic recovery attempt
    /// when both primary stores come up empty.
    pub async fn start(
        platform: Arc<dyn PlatformPersistence>,
        cfg: &Config,
    ) -> Result<(Self, StartupOutcome)> {
        let mut this = Self::new(platform, cfg);

        let trade_store = this.platform.trade_store();
        let timeout = cfg.init_timeout();
        match tokio::time::timeout(timeout, trade_store.initialize_database()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Trade store initialization failed: {}", e);
                return Err(Error::service("startup", Error::Storage(e)));
            }
            Err(_) => {
                error!("Trade store initialization timed out after {:?}", timeout);
                return Err(Error::service(
                    "startup",
                    Error::Storage(StorageError::Timeout {
                        backend: trade_store.name().to_string(),
                        seconds: timeout.as_secs(),
                    }),
                ));
            }
        }

        let settings = this.load_settings().await;
        let trades = this
            .ledger
            .get_all()
            .await
            .map_err(|e| Error::service("startup", e))?;

        let outcome = match settings {
            Some(profile) => {
                this.profile = profile;
                StartupOutcome::Loaded {
                    trades: trades.len(),
                }
            }
            None if !trades.is_empty() => {
                warn!(
                    "Found {} trades but no risk settings; profile needs configuring",
                    trades.len()
                );
                StartupOutcome::Loaded {
                    trades: trades.len(),
                }
            }
            None if cfg.auto_recover => this.recover_on_startup().await?,
            None => StartupOutcome::FreshStart,
        };

        this.refresh().await?;
        info!(
            "Startup on {} platform: {:?} (balance {:.2}, {} trades)",
            this.platform.name(),
            outcome,
            this.profile.current_balance,
            this.view.trades.len()
        );
        Ok((this, outcome))
    }

    /// Settings from the config store; corrupt or invalid records are
    /// treated as missing so recovery gets a chance.
    async fn load_settings(&self) -> Option<RiskProfile> {
        let store = Arc::clone(&self.config_store);
        match with_retry(&self.retry, "load settings", || store.load_risk_settings()).await {
            Ok(Some(profile)) if !profile.is_configured() || profile.validate().is_ok() => {
                Some(profile)
            }
            Ok(Some(profile)) => {
                warn!("Stored risk settings are invalid, ignoring: {:?}", profile);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read risk settings: {}", e);
                None
            }
        }
    }

    async fn recover_on_startup(&mut self) -> Result<StartupOutcome> {
        if self.recovery_attempted {
            return Ok(StartupOutcome::NoRecoverableData);
        }
        self.recovery_attempted = true;

        let report = self.backup.check_startup_data().await;
        for tier in &report.tiers {
            info!(
                "  tier {}: available={} keys={} data={}",
                tier.name, tier.available, tier.key_count, tier.has_data
            );
        }

        let Some(found) = self.backup.try_recover_data().await? else {
            self.last_error = Some("No recoverable data found".to_string());
            return Ok(StartupOutcome::NoRecoverableData);
        };

        let trades = found.snapshot.trades.len();
        self.profile = self
            .backup
            .restore_data(&found.snapshot, &mut self.ledger)
            .await
            .map_err(|e| Error::service("startup recovery", e))?;
        Ok(StartupOutcome::Recovered {
            source: found.source,
            trades,
        })
    }

    // --- observers ----------------------------------------------------------

    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    fn notify(&self, kind: ChangeKind) {
        let change = StateChange {
            kind,
            status: self.risk_status(),
            statistics: self.view.statistics.clone(),
            trade_count: self.view.trades.len(),
        };
        for listener in &self.listeners {
            listener(&change);
        }
    }

    // --- readers ------------------------------------------------------------

    pub fn profile(&self) -> &RiskProfile {
        &self.profile
    }

    pub fn risk_status(&self) -> RiskStatus {
        RiskStatus::from_profile(&self.profile)
    }

    pub fn statistics(&self) -> &TradingStatistics {
        &self.view.statistics
    }

    pub fn trades(&self) -> &[Trade] {
        &self.view.trades
    }

    /// Newest first.
    pub async fn recent_trades(&self, limit: usize) -> Result<Vec<Trade>> {
        self.ledger.recent(limit).await
    }

    pub async fn trades_between(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Trade>> {
        self.ledger.get_by_date_range(start, end).await
    }

    pub fn drawdown_series(&self) -> Vec<DrawdownPoint> {
        DrawdownSeriesCalculator::for_profile(&self.profile).from_trades(&self.view.trades)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    pub fn last_backup(&self) -> Option<&BackupOutcome> {
        self.last_backup.as_ref()
    }

    /// True when a failed mutation could not put the stored settings back.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn platform_name(&self) -> &'static str {
        self.platform.name()
    }

    pub async fn check_startup_data(&self) -> StartupReport {
        self.backup.check_startup_data().await
    }

    // --- mutations ----------------------------------------------------------

    pub async fn add_trade(&mut self, amount: f64) -> Result<Trade> {
        let out = self.try_add_trade(NewTrade::new(amount)).await;
        self.track(out)
    }

    /// Parse user text into a trade amount and add it.
    pub async fn add_trade_input(&mut self, input: &str) -> Result<Trade> {
        let out = parse_amount(input);
        match self.track(out) {
            Ok(amount) => self.add_trade(amount).await,
            Err(e) => Err(e),
        }
    }

    pub async fn add_trade_at(&mut self, trade: NewTrade) -> Result<Trade> {
        let out = self.try_add_trade(trade).await;
        self.track(out)
    }

    async fn try_add_trade(&mut self, trade: NewTrade) -> Result<Trade> {
        const OP: &str = "add_trade";
        validate_amount(trade.result)?;
        TradeGate::evaluate(&self.profile, trade.result).into_result(trade.result)?;

        let mut results = self.current_results().await?;
        results.push(trade.result);
        let next = self.with_floor(self.profile.update_balance(trade.result), &results);

        self.persist_settings(OP, &next).await?;
        let saved = match self.ledger.add(trade).await {
            Ok(saved) => saved,
            Err(e) => return Err(self.rollback(OP, e).await),
        };

        self.commit(next, ChangeKind::TradeAdded).await?;
        info!(
            "Trade #{} {:+.2} -> balance {:.2}",
            saved.id, saved.result, self.profile.current_balance
        );
        Ok(saved)
    }

    pub async fn update_trade(&mut self, trade: Trade) -> Result<Trade> {
        let out = self.try_update_trade(trade).await;
        self.track(out)
    }

    async fn try_update_trade(&mut self, trade: Trade) -> Result<Trade> {
        const OP: &str = "update_trade";
        validate_amount(trade.result)?;
        let old = self.existing_trade(OP, trade.id).await?;

        // only a change for the worse has to clear the gate
        if trade.result < 0.0 && trade.result < old.result {
            let without_old = self.profile.update_balance(-old.result);
            TradeGate::evaluate(&without_old, trade.result).into_result(trade.result)?;
        }

        let results: Vec<f64> = self
            .ledger
            .get_all()
            .await
            .map_err(|e| Error::service(OP, e))?
            .iter()
            .map(|t| if t.id == trade.id { trade.result } else { t.result })
            .collect();
        let next = self.with_floor(
            self.profile.update_balance(trade.result - old.result),
            &results,
        );

        self.persist_settings(OP, &next).await?;
        let saved = match self.ledger.update(&trade).await {
            Ok(saved) => saved,
            Err(e) => return Err(self.rollback(OP, e).await),
        };

        self.commit(next, ChangeKind::TradeUpdated).await?;
        Ok(saved)
    }

    pub async fn delete_trade(&mut self, id: i64) -> Result<()> {
        let out = self.try_delete_trade(id).await;
        self.track(out)
    }

    async fn try_delete_trade(&mut self, id: i64) -> Result<()> {
        const OP: &str = "delete_trade";
        let old = self.existing_trade(OP, id).await?;

        let results: Vec<f64> = self
            .ledger
            .get_all()
            .await
            .map_err(|e| Error::service(OP, e))?
            .iter()
            .filter(|t| t.id != id)
            .map(|t| t.result)
            .collect();
        let next = self.with_floor(self.profile.update_balance(-old.result), &results);

        self.persist_settings(OP, &next).await?;
        if let Err(e) = self.ledger.delete(id).await {
            return Err(self.rollback(OP, e).await);
        }

        self.commit(next, ChangeKind::TradeDeleted).await
    }

    /// Set up the account from scratch: balance, ceiling, per-trade share and
    /// mode. The running balance restarts at `account_balance`.
    pub async fn configure_account(
        &mut self,
        account_balance: f64,
        max_drawdown: f64,
        loss_per_trade_percentage: f64,
        is_dynamic: bool,
    ) -> Result<()> {
        let out = match RiskProfile::new(
            account_balance,
            max_drawdown,
            loss_per_trade_percentage,
            is_dynamic,
        ) {
            Ok(next) => self.apply_settings("configure_account", next).await,
            Err(e) => Err(e),
        };
        self.track(out)
    }

    pub async fn update_max_drawdown(&mut self, max_drawdown: f64) -> Result<()> {
        let out = self.try_update_max_drawdown(max_drawdown).await;
        self.track(out)
    }

    async fn try_update_max_drawdown(&mut self, max_drawdown: f64) -> Result<()> {
        let next = self.profile.with_max_drawdown(max_drawdown)?;
        let results = self.current_results().await?;
        let next = self.with_floor(next, &results);
        self.apply_settings("update_max_drawdown", next).await
    }

    pub async fn update_loss_per_trade(&mut self, percentage: f64) -> Result<()> {
        let out = match self.profile.with_loss_per_trade(percentage) {
            Ok(next) => self.apply_settings("update_loss_per_trade", next).await,
            Err(e) => Err(e),
        };
        self.track(out)
    }

    pub async fn set_dynamic_max_drawdown(&mut self, dynamic: bool) -> Result<()> {
        let out = self.try_set_dynamic(dynamic).await;
        self.track(out)
    }

    async fn try_set_dynamic(&mut self, dynamic: bool) -> Result<()> {
        let next = self.profile.with_dynamic_max_drawdown(dynamic);
        let results = self.current_results().await?;
        let next = self.with_floor(next, &results);
        self.apply_settings("set_dynamic_max_drawdown", next).await
    }

    async fn apply_settings(&mut self, operation: &'static str, next: RiskProfile) -> Result<()> {
        self.persist_settings(operation, &next).await?;
        self.commit(next, ChangeKind::SettingsChanged).await
    }

    pub async fn clear_all_trades(&mut self) -> Result<()> {
        let out = self.try_clear_all_trades().await;
        self.track(out)
    }

    async fn try_clear_all_trades(&mut self) -> Result<()> {
        const OP: &str = "clear_all_trades";
        let next = self.profile.with_balance_reset();
        self.persist_settings(OP, &next).await?;
        if let Err(e) = self.ledger.clear_all().await {
            return Err(self.rollback(OP, e).await);
        }
        self.commit(next, ChangeKind::TradesCleared).await
    }

    /// Wipe settings, trades and backups; the profile returns to the
    /// unconfigured all-zero state.
    pub async fn reset_to_defaults(&mut self) -> Result<()> {
        let out = self.try_reset_to_defaults().await;
        self.track(out)
    }

    async fn try_reset_to_defaults(&mut self) -> Result<()> {
        const OP: &str = "reset_to_defaults";
        let store = Arc::clone(&self.config_store);
        with_retry(&self.retry, "clear settings", || store.clear_risk_settings())
            .await
            .map_err(|e| Error::service(OP, Error::Storage(e)))?;
        if let Err(e) = self.ledger.clear_all().await {
            return Err(self.rollback(OP, e).await);
        }

        self.backup.clear_backups().await;
        self.profile = RiskProfile::default();
        self.unsaved = false;
        self.refresh().await?;
        self.notify(ChangeKind::Reset);
        info!("Reset to defaults");
        Ok(())
    }

    // --- recovery -----------------------------------------------------------

    /// Manual recovery from the highest-priority valid snapshot. `Ok(None)`
    /// means nothing usable was found and state is untouched.
    pub async fn recover(&mut self) -> Result<Option<String>> {
        let out = self.try_recover().await;
        self.track_recovery(out)
    }

    async fn try_recover(&mut self) -> Result<Option<String>> {
        let Some(found) = self.backup.try_recover_data().await? else {
            return Ok(None);
        };
        self.apply_snapshot("recover", &found.snapshot).await?;
        Ok(Some(found.source))
    }

    /// Manual recovery that merges every valid snapshot across tiers.
    /// Returns the number of trades restored.
    pub async fn recover_merged(&mut self) -> Result<Option<usize>> {
        let out = self.try_recover_merged().await;
        self.track_recovery(out)
    }

    async fn try_recover_merged(&mut self) -> Result<Option<usize>> {
        let sources = self.backup.collect_snapshots().await;
        info!("Merging {} backup snapshot(s)", sources.len());
        let Some(merged) = BackupRecoveryManager::merge_backup_data(sources) else {
            return Ok(None);
        };
        self.apply_snapshot("recover_merged", &merged).await?;
        Ok(Some(merged.trades.len()))
    }

    fn track_recovery<T>(&mut self, out: Result<Option<T>>) -> Result<Option<T>> {
        if let Ok(None) = out {
            self.last_error = Some("No recoverable data found".to_string());
        }
        self.track(out)
    }

    pub async fn restore(&mut self, snapshot: &BackupSnapshot) -> Result<()> {
        let out = self.apply_snapshot("restore", snapshot).await;
        self.track(out)
    }

    async fn apply_snapshot(&mut self, operation: &'static str, snapshot: &BackupSnapshot) -> Result<()> {
        match self.backup.restore_data(snapshot, &mut self.ledger).await {
            Ok(restored) => {
                self.unsaved = false;
                self.commit(restored, ChangeKind::Restored).await
            }
            // rejected snapshots never reach the stores
            Err(e @ Error::Validation(_)) => Err(Error::service(operation, e)),
            Err(e) => {
                self.resync_after_failed_restore(operation).await;
                Err(Error::service(operation, e))
            }
        }
    }

    /// A restore that stopped part way can leave the ledger emptied or half
    /// imported. Rebuild balance and threshold from whatever the store holds
    /// now and flag the journal as diverged from the last request.
    async fn resync_after_failed_restore(&mut self, operation: &'static str) {
        self.unsaved = true;
        self.ledger.invalidate();
        let trades = match self.ledger.get_all().await {
            Ok(trades) => trades,
            Err(e) => {
                error!("{}: reloading trades after failed restore: {}", operation, e);
                return;
            }
        };

        let results: Vec<f64> = trades.iter().map(|t| t.result).collect();
        let rebuilt = self.profile.with_balance_reset().update_balance(results.iter().sum());
        let next = self.with_floor(rebuilt, &results);
        warn!(
            "{}: restore failed, {} trades left in store, balance now {:.2}",
            operation,
            trades.len(),
            next.current_balance
        );

        self.profile = next;
        self.view = StateView {
            statistics: TradingStatistics::from_trades(&trades),
            trades,
        };
        if let Err(e) = self.persist_settings(operation, &next).await {
            error!("{}: saving rebuilt settings failed: {}", operation, e);
        }
        self.notify(ChangeKind::Restored);
    }

    pub async fn export_data(&mut self) -> Result<ExportFile> {
        let trades = self
            .ledger
            .get_all()
            .await
            .map_err(|e| Error::service("export", e))?;
        let snapshot = BackupSnapshot::new(&self.backup_version(), &self.profile, &trades);
        Ok(ExportFile::new(snapshot, self.platform.name()))
    }

    pub async fn import_data(&mut self, snapshot: &BackupSnapshot) -> Result<()> {
        let out = match snapshot.risk_settings.validate() {
            Ok(()) => self.apply_snapshot("import", snapshot).await,
            Err(e) => Err(e),
        };
        self.track(out)
    }

    pub async fn close(&self) -> Result<()> {
        self.platform
            .trade_store()
            .close()
            .await
            .map_err(|e| Error::service("close", Error::Storage(e)))
    }

    // --- plumbing -----------------------------------------------------------

    fn backup_version(&self) -> String {
        self.backup.version().to_string()
    }

    fn track<T>(&mut self, out: Result<T>) -> Result<T> {
        if let Err(e) = &out {
            if e.is_user_facing() {
                info!("Rejected: {}", e);
            } else {
                error!("Operation failed: {}", e);
            }
            self.last_error = Some(e.to_string());
        }
        out
    }

    async fn current_results(&mut self) -> Result<Vec<f64>> {
        Ok(self
            .ledger
            .get_all()
            .await
            .map_err(|e| Error::service("load trades", e))?
            .iter()
            .map(|t| t.result)
            .collect())
    }

    async fn existing_trade(&mut self, operation: &'static str, id: i64) -> Result<Trade> {
        self.ledger
            .get_by_id(id)
            .await
            .map_err(|e| Error::service(operation, e))?
            .ok_or_else(|| Error::Validation(format!("trade {} does not exist", id)))
    }

    /// Cache the final trailing floor for `results` on the profile.
    fn with_floor(&self, profile: RiskProfile, results: &[f64]) -> RiskProfile {
        let floor = DrawdownSeriesCalculator::for_profile(&profile).final_floor(results);
        profile.with_drawdown_threshold(floor)
    }

    async fn persist_settings(&self, operation: &'static str, profile: &RiskProfile) -> Result<()> {
        let store = Arc::clone(&self.config_store);
        with_retry(&self.retry, "save settings", || store.save_risk_settings(profile))
            .await
            .map_err(|e| {
                error!("{}: saving settings failed: {}", operation, e);
                Error::service(operation, Error::Storage(e))
            })
    }

    /// Put the previously committed settings back after a ledger write
    /// failed, and lift the ledger error to the service level.
    async fn rollback(&mut self, operation: &'static str, err: Error) -> Error {
        let committed = self.profile;
        if let Err(e) = self.persist_settings(operation, &committed).await {
            error!("{}: rollback of settings failed: {}", operation, e);
            self.unsaved = true;
        }
        self.ledger.invalidate();
        Error::service(operation, err)
    }

    async fn commit(&mut self, next: RiskProfile, kind: ChangeKind) -> Result<()> {
        self.profile = next;
        self.unsaved = false;
        self.refresh().await?;
        self.mirror().await;
        self.notify(kind);
        Ok(())
    }

    /// Best effort: primary persistence already succeeded, so a backup
    /// failure is reported but never rolls anything back.
    async fn mirror(&mut self) {
        match self
            .backup
            .force_save_data(&self.profile, &self.view.trades)
            .await
        {
            Ok(outcome) => {
                if outcome.is_partial() {
                    warn!(
                        "Backup partially written: ok={:?} failed={:?}",
                        outcome.succeeded, outcome.failed
                    );
                }
                self.last_backup = Some(outcome);
            }
            Err(e) => {
                error!("Backup mirroring failed: {}", e);
                self.last_error = Some(format!("Backup failed: {}", e));
                self.last_backup = None;
            }
        }
    }

    async fn refresh(&mut self) -> Result<()> {
        let trades = self
            .ledger
            .get_all()
            .await
            .map_err(|e| Error::service("refresh", e))?;
        self.view = StateView {
            statistics: TradingStatistics::from_trades(&trades),
            trades,
        };
        Ok(())
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() {
        return Err(Error::Validation(format!(
            "trade amount must be a finite number, got {}",
            amount
        )));
    }
    Ok(())
}

/// Parse a user-entered amount such as `-125.50`, `+80` or `1,250`.
pub fn parse_amount(input: &str) -> Result<f64> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '$' && !c.is_whitespace())
        .collect();
    let amount: f64 = cleaned
        .parse()
        .map_err(|_| Error::Validation(format!("'{}' is not a number", input.trim())))?;
    validate_amount(amount)?;
    Ok(amount)
}
