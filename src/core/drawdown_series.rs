use serde::{Deserialize, Serialize};

use crate::models::{RiskProfile, Trade};

/// One point of the trailing-drawdown curve. `index` 0 is the seed; trade
/// `i` (zero-based) lands at `index = i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub index: usize,
    pub cumulative_pnl: f64,
    pub floor: f64,
}

/// Trailing drawdown floor for display next to cumulative P&L.
///
/// Everything is measured on a P&L basis (balance minus the initial
/// balance), so the seed floor is `-max_drawdown`. The floor only moves on
/// a profit once the P&L sits at least `max_drawdown` above it, and then it
/// trails at `pnl - max_drawdown`. Static mode caps the trailed floor at 0
/// and never lets it sink below `-max_drawdown`; dynamic mode lets it climb
/// above 0. A zero-result trade re-anchors the floor to the current
/// distance from the peak (dynamic) or from the initial balance (static).
#[derive(Debug, Clone, Copy)]
pub struct DrawdownSeriesCalculator {
    initial_balance: f64,
    max_drawdown: f64,
    is_dynamic: bool,
}

impl DrawdownSeriesCalculator {
    pub fn new(initial_balance: f64, max_drawdown: f64, is_dynamic: bool) -> Self {
        Self {
            initial_balance,
            max_drawdown,
            is_dynamic,
        }
    }

    pub fn for_profile(profile: &RiskProfile) -> Self {
        Self::new(
            profile.account_balance,
            profile.max_drawdown,
            profile.is_dynamic_max_drawdown,
        )
    }

    pub fn from_trades(&self, trades: &[Trade]) -> Vec<DrawdownPoint> {
        let results: Vec<f64> = trades.iter().map(|t| t.result).collect();
        self.calculate(&results)
    }

    pub fn calculate(&self, results: &[f64]) -> Vec<DrawdownPoint> {
        if results.is_empty() {
            return Vec::new();
        }

        let seed = -self.max_drawdown;
        let mut points = Vec::with_capacity(results.len() + 1);
        points.push(DrawdownPoint {
            index: 0,
            cumulative_pnl: 0.0,
            floor: seed,
        });

        let mut running = self.initial_balance;
        let mut peak = self.initial_balance;
        let mut floor = seed;

        for (i, &result) in results.iter().enumerate() {
            running += result;
            peak = peak.max(running);
            let pnl = running - self.initial_balance;

            if result > 0.0 {
                let distance = pnl - floor;
                if distance >= self.max_drawdown {
                    let trailed = pnl - self.max_drawdown;
                    floor = if self.is_dynamic { trailed } else { trailed.min(0.0) };
                }
            } else if result == 0.0 {
                let potential = if self.is_dynamic {
                    running - peak
                } else {
                    running - self.initial_balance
                };
                floor = potential.max(seed);
            }
            // losses leave the floor where it is

            if !self.is_dynamic {
                floor = floor.max(seed);
            }

            points.push(DrawdownPoint {
                index: i + 1,
                cumulative_pnl: pnl,
                floor,
            });
        }

        points
    }

    /// Floor after the last trade, or the seed for an empty history.
    pub fn final_floor(&self, results: &[f64]) -> f64 {
        self.calculate(results)
            .last()
            .map(|p| p.floor)
            .unwrap_or(-self.max_drawdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floors(points: &[DrawdownPoint]) -> Vec<f64> {
        points.iter().map(|p| p.floor).collect()
    }

    #[test]
    fn empty_history_has_no_points() {
        let calc = DrawdownSeriesCalculator::new(10_000.0, 500.0, false);
        assert!(calc.calculate(&[]).is_empty());
        assert_eq!(calc.final_floor(&[]), -500.0);
    }

    #[test]
    fn seed_then_one_point_per_trade() {
        let calc = DrawdownSeriesCalculator::new(10_000.0, 500.0, false);
        let points = calc.calculate(&[-100.0, 300.0, -50.0]);
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].index, 0);
        assert_eq!(points[0].floor, -500.0);
        assert_eq!(points[3].index, 3);
        assert_eq!(points[3].cumulative_pnl, 150.0);
    }

    #[test]
    fn losses_never_move_the_floor() {
        let calc = DrawdownSeriesCalculator::new(10_000.0, 500.0, false);
        let points = calc.calculate(&[-100.0, -200.0, -400.0]);
        assert_eq!(floors(&points), vec![-500.0; 4]);
    }

    #[test]
    fn static_profit_ratchets_but_caps_at_zero() {
        let calc = DrawdownSeriesCalculator::new(10_000.0, 500.0, false);
        // pnl 300: distance 800 >= 500 -> floor -200
        // pnl 900: distance 1100 -> floor 400, capped to 0
        // pnl 950: distance 950 -> floor 450, capped to 0
        let points = calc.calculate(&[300.0, 600.0, 50.0]);
        assert_eq!(floors(&points), vec![-500.0, -200.0, 0.0, 0.0]);
    }

    #[test]
    fn profit_inside_slack_keeps_floor() {
        let calc = DrawdownSeriesCalculator::new(10_000.0, 500.0, false);
        // pnl -400 then -300: distance 200 < 500, floor stays
        let points = calc.calculate(&[-400.0, 100.0]);
        assert_eq!(floors(&points), vec![-500.0, -500.0, -500.0]);
    }

    #[test]
    fn dynamic_floor_can_rise_above_zero() {
        let calc = DrawdownSeriesCalculator::new(10_000.0, 500.0, true);
        let points = calc.calculate(&[300.0, 600.0, -200.0]);
        assert_eq!(floors(&points), vec![-500.0, -200.0, 400.0, 400.0]);
    }

    #[test]
    fn zero_result_reanchors_floor() {
        let dynamic = DrawdownSeriesCalculator::new(10_000.0, 500.0, true);
        // after +600 the floor trails at 100; -200 keeps it; the flat trade
        // re-anchors to running - peak = -200
        let points = dynamic.calculate(&[600.0, -200.0, 0.0]);
        assert_eq!(floors(&points), vec![-500.0, 100.0, 100.0, -200.0]);

        let fixed = DrawdownSeriesCalculator::new(10_000.0, 500.0, false);
        // static: running - initial = -800, clamped to -500
        let points = fixed.calculate(&[-800.0, 0.0]);
        assert_eq!(floors(&points), vec![-500.0, -500.0, -500.0]);
        // static: +200 trails to -300, then running - initial = 200 stands
        let points = fixed.calculate(&[200.0, 0.0]);
        assert_eq!(floors(&points), vec![-500.0, -300.0, 200.0]);
    }
}
