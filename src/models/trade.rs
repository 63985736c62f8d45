use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A committed trade. `id` is assigned by the trade store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub result: f64,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.result > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.result < 0.0
    }

    pub fn to_record(&self) -> TradeRecord {
        TradeRecord {
            id: Some(self.id),
            result: self.result,
            timestamp: self.timestamp,
        }
    }
}

/// A trade not yet written to storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewTrade {
    pub result: f64,
    pub timestamp: DateTime<Utc>,
}

impl NewTrade {
    pub fn new(result: f64) -> Self {
        Self {
            result,
            timestamp: Utc::now(),
        }
    }

    pub fn at(result: f64, timestamp: DateTime<Utc>) -> Self {
        Self { result, timestamp }
    }
}

/// Plain trade record as it appears in exports and backup snapshots. The id
/// is informational only; imports always get fresh identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub result: f64,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    pub fn to_new_trade(&self) -> NewTrade {
        NewTrade::at(self.result, self.timestamp)
    }

    /// Identity used when unioning trade lists from several snapshots.
    pub fn dedup_key(&self) -> (i64, u64) {
        (self.timestamp.timestamp_millis(), self.result.to_bits())
    }
}
