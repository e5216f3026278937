// Repository trait for tank readings and event records
use crate::domain::events::{PumpActivation, RefillRecord};
use crate::domain::tank::LatestSnapshot;
use crate::domain::telemetry::Reading;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or answered with an error.
    #[error("data unavailable: {0}")]
    Unavailable(String),
    #[error("malformed store payload: {0}")]
    Malformed(String),
    #[error("record not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A partial write to the latest snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum LatestUpdate {
    LastRefill { timestamp_ms: i64, level: Option<f64> },
    ClearLastRefill,
    Pump { is_on: bool, changed_at_ms: i64 },
}

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Readings within the optional bounds, ascending and deduplicated by
    /// timestamp.
    async fn fetch_readings(&self, start_ms: Option<i64>, end_ms: Option<i64>) -> StoreResult<Vec<Reading>>;

    /// Recorded refills at or after `start_ms`.
    async fn fetch_refill_records(&self, start_ms: Option<i64>) -> StoreResult<Vec<RefillRecord>>;

    /// Pump records at or after `start_ms`.
    async fn fetch_pump_records(&self, start_ms: Option<i64>) -> StoreResult<Vec<PumpActivation>>;

    async fn fetch_latest(&self) -> StoreResult<Option<LatestSnapshot>>;

    async fn put_refill_record(&self, record: &RefillRecord) -> StoreResult<()>;

    async fn delete_refill_record(&self, timestamp_ms: i64) -> StoreResult<()>;

    async fn put_pump_record(&self, record: &PumpActivation) -> StoreResult<()>;

    /// Mark a stored activation as closed by a later deactivation.
    async fn close_pump_activation(
        &self,
        activation_ms: i64,
        deactivated_at_ms: i64,
        duration_ms: i64,
    ) -> StoreResult<()>;

    async fn update_latest(&self, update: &LatestUpdate) -> StoreResult<()>;
}
