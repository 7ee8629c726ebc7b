// Source trait for numeric snapshots pulled by the refresh loop
use crate::domain::error::TelemetryError;
use async_trait::async_trait;

/// Arbitrary JSON document returned by a backend service.
pub type NumericSnapshot = serde_json::Value;

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch one snapshot. Timeouts are the implementation's concern; any
    /// failure is reported as `TelemetryError::FetchFailure`.
    async fn fetch_snapshot(&self) -> Result<NumericSnapshot, TelemetryError>;

    /// Short label used in log lines.
    fn describe(&self) -> String {
        "snapshot source".to_string()
    }
}
