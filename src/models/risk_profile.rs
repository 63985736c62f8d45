use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The trader's risk configuration and live balance.
///
/// Profiles are values: every settings change produces a new profile through
/// one of the `with_*` builders, which validate only the field they change.
/// `Default` is the unconfigured first-launch state (all zeros) and is the
/// only profile that skips validation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RiskSettingsRecord")]
pub struct RiskProfile {
    pub max_drawdown: f64,
    pub loss_per_trade_percentage: f64,
    pub account_balance: f64,
    pub current_balance: f64,
    pub is_dynamic_max_drawdown: bool,
    pub current_drawdown_threshold: f64,
}

/// Persisted settings shape. Only the three configuration fields are
/// mandatory; the rest fall back to values derived from them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiskSettingsRecord {
    max_drawdown: f64,
    loss_per_trade_percentage: f64,
    account_balance: f64,
    #[serde(default)]
    current_balance: Option<f64>,
    #[serde(default)]
    is_dynamic_max_drawdown: bool,
    #[serde(default)]
    current_drawdown_threshold: Option<f64>,
}

impl From<RiskSettingsRecord> for RiskProfile {
    fn from(r: RiskSettingsRecord) -> Self {
        RiskProfile {
            max_drawdown: r.max_drawdown,
            loss_per_trade_percentage: r.loss_per_trade_percentage,
            account_balance: r.account_balance,
            current_balance: r.current_balance.unwrap_or(r.account_balance),
            is_dynamic_max_drawdown: r.is_dynamic_max_drawdown,
            current_drawdown_threshold: r
                .current_drawdown_threshold
                .unwrap_or(-r.max_drawdown),
        }
    }
}

impl RiskProfile {
    /// Build a freshly configured profile. `current_balance` starts at the
    /// account balance and the trailing threshold at `-max_drawdown`.
    pub fn new(
        account_balance: f64,
        max_drawdown: f64,
        loss_per_trade_percentage: f64,
        is_dynamic_max_drawdown: bool,
    ) -> Result<Self> {
        validate_account_balance(account_balance)?;
        validate_max_drawdown(max_drawdown, account_balance)?;
        validate_loss_percentage(loss_per_trade_percentage)?;

        Ok(RiskProfile {
            max_drawdown,
            loss_per_trade_percentage,
            account_balance,
            current_balance: account_balance,
            is_dynamic_max_drawdown,
            current_drawdown_threshold: -max_drawdown,
        })
    }

    /// Full check, used on profiles coming back from storage or imports.
    pub fn validate(&self) -> Result<()> {
        validate_account_balance(self.account_balance)?;
        validate_max_drawdown(self.max_drawdown, self.account_balance)?;
        validate_loss_percentage(self.loss_per_trade_percentage)?;
        if !self.current_balance.is_finite() {
            return Err(Error::Validation("current balance must be finite".into()));
        }
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.account_balance > 0.0 || self.loss_per_trade_percentage > 0.0
    }

    // --- copy-with builders -------------------------------------------------

    pub fn with_max_drawdown(&self, max_drawdown: f64) -> Result<Self> {
        validate_max_drawdown(max_drawdown, self.account_balance)?;
        Ok(RiskProfile {
            max_drawdown,
            current_drawdown_threshold: -max_drawdown,
            ..*self
        })
    }

    pub fn with_loss_per_trade(&self, percentage: f64) -> Result<Self> {
        validate_loss_percentage(percentage)?;
        Ok(RiskProfile {
            loss_per_trade_percentage: percentage,
            ..*self
        })
    }

    pub fn with_dynamic_max_drawdown(&self, dynamic: bool) -> Self {
        RiskProfile {
            is_dynamic_max_drawdown: dynamic,
            ..*self
        }
    }

    pub fn with_drawdown_threshold(&self, threshold: f64) -> Self {
        RiskProfile {
            current_drawdown_threshold: threshold,
            ..*self
        }
    }

    /// Running balance back at the configured account balance, as after a
    /// full trade wipe.
    pub fn with_balance_reset(&self) -> Self {
        RiskProfile {
            current_balance: self.account_balance,
            current_drawdown_threshold: -self.max_drawdown,
            ..*self
        }
    }

    pub fn update_balance(&self, delta: f64) -> Self {
        RiskProfile {
            current_balance: self.current_balance + delta,
            ..*self
        }
    }

    // --- derived quantities -------------------------------------------------

    pub fn effective_max_drawdown(&self) -> f64 {
        if self.is_dynamic_max_drawdown {
            self.max_drawdown + (self.current_balance - self.account_balance).max(0.0)
        } else {
            self.max_drawdown
        }
    }

    pub fn current_drawdown_amount(&self) -> f64 {
        (self.account_balance - self.current_balance).max(0.0)
    }

    pub fn remaining_risk_capacity(&self) -> f64 {
        (self.effective_max_drawdown() - self.current_drawdown_amount()).max(0.0)
    }

    pub fn max_loss_per_trade(&self) -> f64 {
        self.remaining_risk_capacity() * self.loss_per_trade_percentage / 100.0
    }

    /// Profits always pass; a loss passes when its magnitude fits the
    /// per-trade limit.
    pub fn is_trade_within_risk_limits(&self, amount: f64) -> bool {
        if amount > 0.0 {
            return true;
        }
        amount.abs() <= self.max_loss_per_trade()
    }

    pub fn would_exceed_max_drawdown(&self, amount: f64) -> bool {
        if amount > 0.0 {
            return false;
        }
        let projected = self.account_balance - (self.current_balance + amount);
        projected > self.effective_max_drawdown()
    }

    /// Share of the effective drawdown already used, in percent.
    pub fn drawdown_used_pct(&self) -> f64 {
        let effective = self.effective_max_drawdown();
        if effective <= 0.0 {
            return if self.current_drawdown_amount() > 0.0 { 100.0 } else { 0.0 };
        }
        (self.current_drawdown_amount() / effective * 100.0).min(100.0)
    }
}

fn validate_account_balance(balance: f64) -> Result<()> {
    if !balance.is_finite() || balance < 0.0 {
        return Err(Error::Validation(format!(
            "account balance must be a non-negative number, got {}",
            balance
        )));
    }
    Ok(())
}

fn validate_max_drawdown(max_drawdown: f64, account_balance: f64) -> Result<()> {
    if !max_drawdown.is_finite() || max_drawdown < 0.0 {
        return Err(Error::Validation(format!(
            "max drawdown must be a non-negative number, got {}",
            max_drawdown
        )));
    }
    if max_drawdown > account_balance {
        return Err(Error::Validation(format!(
            "max drawdown {:.2} exceeds account balance {:.2}",
            max_drawdown, account_balance
        )));
    }
    Ok(())
}

fn validate_loss_percentage(pct: f64) -> Result<()> {
    if !pct.is_finite() || pct <= 0.0 || pct > 100.0 {
        return Err(Error::Validation(format!(
            "loss per trade must be in (0, 100], got {}",
            pct
        )));
    }
    Ok(())
}
