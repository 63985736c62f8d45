use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tokio::fs as async_fs;
use tracing::info;

use crate::error::{Error, Result, StorageError};
use crate::trading::backup::BackupSnapshot;

const REQUIRED_FIELDS: &[&str] = &["version", "timestamp", "riskSettings", "trades"];
const REQUIRED_SETTINGS: &[&str] = &["accountBalance", "maxDrawdown", "lossPerTradePercentage"];
const REQUIRED_TRADE_FIELDS: &[&str] = &["result", "timestamp"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub trade_count: usize,
    pub app_version: String,
    pub platform: String,
}

/// Export document: a backup snapshot plus a `metadata` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFile {
    #[serde(flatten)]
    pub snapshot: BackupSnapshot,
    pub metadata: ExportMetadata,
}

impl ExportFile {
    pub fn new(snapshot: BackupSnapshot, platform: &str) -> Self {
        let metadata = ExportMetadata {
            exported_at: Utc::now(),
            trade_count: snapshot.trades.len(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            platform: platform.to_string(),
        };
        Self { snapshot, metadata }
    }
}

fn missing(what: &str) -> Error {
    Error::Validation(format!("import file is missing {}", what))
}

/// Check the shape of an import document and turn it into a snapshot.
/// A single malformed trade rejects the whole file.
pub fn parse_import(json: &str) -> Result<BackupSnapshot> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| Error::Validation(format!("import file is not valid JSON: {}", e)))?;
    let root = value
        .as_object()
        .ok_or_else(|| Error::Validation("import file must be a JSON object".into()))?;

    for field in REQUIRED_FIELDS {
        if !root.contains_key(*field) {
            return Err(missing(field));
        }
    }

    let settings = root["riskSettings"]
        .as_object()
        .ok_or_else(|| Error::Validation("riskSettings must be an object".into()))?;
    for field in REQUIRED_SETTINGS {
        if !settings.contains_key(*field) {
            return Err(missing(&format!("riskSettings.{}", field)));
        }
    }

    let trades = root["trades"]
        .as_array()
        .ok_or_else(|| Error::Validation("trades must be an array".into()))?;
    for (i, trade) in trades.iter().enumerate() {
        let obj = trade
            .as_object()
            .ok_or_else(|| Error::Validation(format!("trade #{} is not an object", i)))?;
        for field in REQUIRED_TRADE_FIELDS {
            if !obj.contains_key(*field) {
                return Err(missing(&format!("{} on trade #{}", field, i)));
            }
        }
    }

    let snapshot: BackupSnapshot = serde_json::from_value(value)
        .map_err(|e| Error::Validation(format!("import file has invalid values: {}", e)))?;
    snapshot.risk_settings.validate()?;
    if !snapshot.is_structurally_valid() {
        return Err(Error::Validation("import file contains non-finite numbers".into()));
    }
    Ok(snapshot)
}

pub async fn write_export_file(path: impl AsRef<Path>, export: &ExportFile) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(export).map_err(StorageError::from)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        async_fs::create_dir_all(parent).await.map_err(StorageError::from)?;
    }
    async_fs::write(path, json).await.map_err(StorageError::from)?;
    info!(
        "Exported {} trades to {:?}",
        export.metadata.trade_count, path
    );
    Ok(())
}

pub async fn read_import_file(path: impl AsRef<Path>) -> Result<BackupSnapshot> {
    let content = async_fs::read_to_string(path.as_ref())
        .await
        .map_err(StorageError::from)?;
    parse_import(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_trades, sample_profile, temp_dir};

    const VALID: &str = r#"{
        "version": "1.0.0",
        "timestamp": "2024-05-01T12:00:00Z",
        "riskSettings": {"accountBalance": 10000, "maxDrawdown": 500, "lossPerTradePercentage": 5},
        "trades": [
            {"id": 3, "result": -25.5, "timestamp": "2024-05-01T09:00:00Z"},
            {"result": 80, "timestamp": "2024-05-01T10:00:00Z"}
        ],
        "metadata": {"exportedAt": "2024-05-01T12:00:00Z"}
    }"#;

    #[test]
    fn accepts_minimal_valid_file() {
        let snapshot = parse_import(VALID).unwrap();
        assert_eq!(snapshot.trades.len(), 2);
        assert_eq!(snapshot.risk_settings.current_balance, 10_000.0);
        assert_eq!(snapshot.risk_settings.current_drawdown_threshold, -500.0);
    }

    #[test]
    fn rejects_missing_top_level_field() {
        let mut v: Value = serde_json::from_str(VALID).unwrap();
        v.as_object_mut().unwrap().remove("version");
        let err = parse_import(&v.to_string()).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn rejects_missing_settings_field() {
        let mut v: Value = serde_json::from_str(VALID).unwrap();
        v["riskSettings"].as_object_mut().unwrap().remove("lossPerTradePercentage");
        assert!(matches!(parse_import(&v.to_string()), Err(Error::Validation(_))));
    }

    #[test]
    fn one_bad_trade_rejects_whole_file() {
        let mut v: Value = serde_json::from_str(VALID).unwrap();
        v["trades"][1].as_object_mut().unwrap().remove("timestamp");
        let err = parse_import(&v.to_string()).unwrap_err();
        assert!(err.to_string().contains("trade #1"));
    }

    #[test]
    fn rejects_out_of_range_settings() {
        let mut v: Value = serde_json::from_str(VALID).unwrap();
        v["riskSettings"]["maxDrawdown"] = Value::from(20_000);
        assert!(matches!(parse_import(&v.to_string()), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn export_file_reads_back() {
        let dir = temp_dir("transfer");
        let path = dir.join("export.json");
        let snapshot = BackupSnapshot::new("1.0.0", &sample_profile(), &make_trades(&[10.0, -5.0]));
        let export = ExportFile::new(snapshot.clone(), "memory");
        write_export_file(&path, &export).await.unwrap();

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let v: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["metadata"]["tradeCount"], 2);
        assert!(v["riskSettings"].is_object());

        let back = read_import_file(&path).await.unwrap();
        assert_eq!(back, snapshot);
    }
}
