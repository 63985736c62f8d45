pub mod risk_profile;
pub mod trade;

pub use risk_profile::RiskProfile;
pub use trade::{NewTrade, Trade, TradeRecord};
