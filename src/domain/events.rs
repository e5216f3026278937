// Refill and pump event domain models
use serde::{Deserialize, Serialize};

/// A jump in tank level attributed to a water delivery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefillEvent {
    pub timestamp_ms: i64,
    pub previous_level: f64,
    pub new_level: f64,
    pub increase: f64,
}

impl RefillEvent {
    pub fn new(timestamp_ms: i64, previous_level: f64, new_level: f64) -> Self {
        Self {
            timestamp_ms,
            previous_level,
            new_level,
            increase: new_level - previous_level,
        }
    }
}

/// How a recorded refill takes part in interval rendering.
///
/// Records written before delivery start/end tracking existed carry no
/// boundary information and are drawn as standalone markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecordBoundary {
    LegacyMarker,
    #[serde(rename_all = "camelCase")]
    IntervalBoundary { is_end: bool },
}

impl RecordBoundary {
    /// Maps the stored optional `water_ended` flag onto a boundary.
    pub fn from_water_ended(water_ended: Option<bool>) -> Self {
        match water_ended {
            Some(is_end) => RecordBoundary::IntervalBoundary { is_end },
            None => RecordBoundary::LegacyMarker,
        }
    }

    pub fn water_ended(&self) -> Option<bool> {
        match self {
            RecordBoundary::LegacyMarker => None,
            RecordBoundary::IntervalBoundary { is_end } => Some(*is_end),
        }
    }
}

/// A refill that was marked manually or confirmed by the sensor pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefillRecord {
    pub timestamp_ms: i64,
    pub previous_level: Option<f64>,
    pub new_level: Option<f64>,
    pub boundary: RecordBoundary,
}

impl RefillRecord {
    pub fn increase(&self) -> Option<f64> {
        match (self.previous_level, self.new_level) {
            (Some(previous), Some(new)) => Some(new - previous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpAction {
    Activated,
    Deactivated,
}

impl PumpAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PumpAction::Activated => "activated",
            PumpAction::Deactivated => "deactivated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "activated" => Some(PumpAction::Activated),
            "deactivated" => Some(PumpAction::Deactivated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpActivation {
    pub timestamp_ms: i64,
    pub action: PumpAction,
    /// Only populated on deactivation records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    /// Set on an activation once a deactivation has closed it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated_at_ms: Option<i64>,
}

impl PumpActivation {
    pub fn activated(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            action: PumpAction::Activated,
            duration_ms: None,
            deactivated_at_ms: None,
        }
    }

    pub fn deactivated(timestamp_ms: i64, duration_ms: Option<i64>) -> Self {
        Self {
            timestamp_ms,
            action: PumpAction::Deactivated,
            duration_ms,
            deactivated_at_ms: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.action == PumpAction::Activated && self.deactivated_at_ms.is_none()
    }
}

/// A reconciled start/end pair used for shaded-region rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl Interval {
    /// Returns `None` unless `end_ms` is strictly after `start_ms`.
    pub fn new(start_ms: i64, end_ms: i64) -> Option<Self> {
        (end_ms > start_ms).then_some(Self { start_ms, end_ms })
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// Format a duration as `hh:mm:ss`.
pub fn format_duration(duration_ms: i64) -> String {
    let total_seconds = duration_ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
