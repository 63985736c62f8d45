use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;
use crate::models::RiskProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    LossExceedsPerTradeLimit,
    DrawdownExceeded,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::LossExceedsPerTradeLimit => write!(f, "loss exceeds per-trade limit"),
            RejectionReason::DrawdownExceeded => write!(f, "max drawdown would be exceeded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Accepted,
    Rejected {
        reason: RejectionReason,
        limit: f64,
    },
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted)
    }

    /// Turn a rejection into the error surfaced at the mutation boundary.
    pub fn into_result(self, amount: f64) -> Result<(), Error> {
        match self {
            GateDecision::Accepted => Ok(()),
            GateDecision::Rejected { reason, limit } => Err(Error::RiskLimitExceeded {
                reason,
                limit,
                amount,
            }),
        }
    }
}

/// Pre-commit check for a proposed trade result. Deterministic and
/// side-effect free; must run before anything is persisted.
pub struct TradeGate;

impl TradeGate {
    pub fn evaluate(profile: &RiskProfile, amount: f64) -> GateDecision {
        if amount >= 0.0 {
            return GateDecision::Accepted;
        }

        // Check 1: per-trade loss limit
        if !profile.is_trade_within_risk_limits(amount) {
            return GateDecision::Rejected {
                reason: RejectionReason::LossExceedsPerTradeLimit,
                limit: profile.max_loss_per_trade(),
            };
        }

        // Check 2: total drawdown ceiling
        if profile.would_exceed_max_drawdown(amount) {
            return GateDecision::Rejected {
                reason: RejectionReason::DrawdownExceeded,
                limit: profile.remaining_risk_capacity(),
            };
        }

        GateDecision::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> RiskProfile {
        RiskProfile::new(10_000.0, 1_000.0, 5.0, false).unwrap()
    }

    #[test]
    fn profits_and_zero_always_accepted() {
        let p = profile().update_balance(-5_000.0);
        for amount in [0.0, 0.01, 1.0, 1e12] {
            assert_eq!(TradeGate::evaluate(&p, amount), GateDecision::Accepted);
        }
    }

    #[test]
    fn loss_just_over_limit_rejected() {
        let p = profile();
        let amount = -(p.max_loss_per_trade() + 0.01);
        match TradeGate::evaluate(&p, amount) {
            GateDecision::Rejected { reason, limit } => {
                assert_eq!(reason, RejectionReason::LossExceedsPerTradeLimit);
                assert!((limit - 50.0).abs() < 1e-9);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert!(TradeGate::evaluate(&p, -p.max_loss_per_trade()).is_accepted());
    }

    #[test]
    fn blown_account_rejects_any_loss() {
        let p = RiskProfile::new(10_000.0, 1_000.0, 100.0, false)
            .unwrap()
            .update_balance(-1_000.0);
        assert_eq!(p.max_loss_per_trade(), 0.0);
        let decision = TradeGate::evaluate(&p, -0.0001);
        assert!(matches!(
            decision,
            GateDecision::Rejected {
                reason: RejectionReason::LossExceedsPerTradeLimit,
                ..
            }
        ));

        let with_profit = RiskProfile {
            current_balance: 9_500.0,
            ..RiskProfile::new(10_000.0, 1_000.0, 100.0, false).unwrap()
        };
        assert!(TradeGate::evaluate(&with_profit, -500.0).is_accepted());
    }

    #[test]
    fn rejection_converts_to_error() {
        let err = GateDecision::Rejected {
            reason: RejectionReason::DrawdownExceeded,
            limit: 10.0,
        }
        .into_result(-20.0)
        .unwrap_err();
        assert!(err.is_user_facing());
    }
}
