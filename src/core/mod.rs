pub mod drawdown_series;
pub mod trade_gate;

pub use drawdown_series::{DrawdownPoint, DrawdownSeriesCalculator};
pub use trade_gate::{GateDecision, RejectionReason, TradeGate};
