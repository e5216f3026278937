// Dashboard domain model
use super::events::{Interval, RefillEvent};
use super::tank::{LevelBand, Period};
use super::telemetry::{DisplayPoint, TrendLine};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub average_level: f64,
    pub last_event_timestamp: Option<i64>,
    pub next_expected_timestamp: Option<i64>,
    pub total_events: usize,
}

impl StatsSummary {
    /// A projected refill that is already in the past.
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        self.next_expected_timestamp
            .is_some_and(|next| next <= now_ms)
    }
}

/// Shading and marker layers for one kind of record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySet {
    pub intervals: Vec<Interval>,
    /// Timestamps of records that carry no boundary information.
    pub markers: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TankDashboard {
    pub period: Period,
    pub points: Vec<DisplayPoint>,
    pub events: Vec<RefillEvent>,
    pub trend: Option<TrendLine>,
    pub stats: StatsSummary,
    pub overdue: bool,
    pub current_band: Option<LevelBand>,
    pub pump_is_on: bool,
    pub pump_overlay: OverlaySet,
    pub refill_overlay: OverlaySet,
}
