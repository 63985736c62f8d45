use thiserror::Error;

use crate::core::trade_gate::RejectionReason;

/// Failures raised by a storage backend (config store, trade store or
/// backup tier).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("read failed on {backend}: {message}")]
    Read { backend: String, message: String },

    #[error("write failed on {backend}: {message}")]
    Write { backend: String, message: String },

    #[error("initialization failed on {backend}: {message}")]
    Initialize { backend: String, message: String },

    #[error("{backend} did not initialize within {seconds}s")]
    Timeout { backend: String, seconds: u64 },

    #[error("{0} is unavailable")]
    Unavailable(String),

    #[error("corrupt data in {backend}: {message}")]
    Corrupt { backend: String, message: String },

    #[error("trade {0} not found")]
    TradeNotFound(i64),

    #[error("backup failed on all {attempted} tiers")]
    AllTiersFailed { attempted: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{reason}: trade of {amount:.2} against a limit of {limit:.2}")]
    RiskLimitExceeded {
        reason: RejectionReason,
        limit: f64,
        amount: f64,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("ledger {operation} failed: {source}")]
    Repository {
        operation: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("{operation} failed: {source}")]
    Service {
        operation: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Validation and risk-limit outcomes are expected and shown to the user
    /// as-is; everything else means persistence is in doubt.
    pub fn is_user_facing(&self) -> bool {
        match self {
            Error::Validation(_) | Error::RiskLimitExceeded { .. } => true,
            Error::Service { source, .. } => source.is_user_facing(),
            _ => false,
        }
    }

    pub fn repository(operation: &'static str, source: StorageError) -> Self {
        Error::Repository { operation, source }
    }

    /// Lift an error to the coordination layer. User-facing errors pass
    /// through untouched.
    pub fn service(operation: &'static str, err: Error) -> Self {
        if err.is_user_facing() {
            return err;
        }
        Error::Service {
            operation,
            source: Box::new(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
