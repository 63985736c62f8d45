pub mod backup;
pub mod coordinator;
pub mod ledger;
pub mod transfer;

pub use backup::{BackupOutcome, BackupRecoveryManager, BackupSnapshot, StartupReport, TierStatus};
pub use coordinator::{
    ChangeKind, PersistenceCoordinator, RiskLevel, RiskStatus, StartupOutcome, StateChange,
};
pub use ledger::{TradeLedger, TradingStatistics};
pub use transfer::{parse_import, read_import_file, write_export_file, ExportFile};
