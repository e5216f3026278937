// Tank domain model: display periods, level bands and the latest snapshot
use serde::{Deserialize, Serialize};

const HOUR_MS: i64 = 3_600_000;

/// Selectable chart window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "all")]
    All,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "24h",
            Period::Week => "7d",
            Period::Month => "30d",
            Period::All => "all",
        }
    }

    /// Window length in hours, `None` for the unbounded period.
    pub fn hours(&self) -> Option<i64> {
        match self {
            Period::Day => Some(24),
            Period::Week => Some(24 * 7),
            Period::Month => Some(24 * 30),
            Period::All => None,
        }
    }

    /// Minimum gap between retained display points.
    pub fn bucket_hours(&self) -> f64 {
        match self {
            Period::Day => 1.0,
            Period::Week => 6.0,
            Period::Month => 24.0,
            Period::All => 1.0,
        }
    }

    pub fn window_start(&self, now_ms: i64) -> Option<i64> {
        self.hours().map(|hours| now_ms - hours * HOUR_MS)
    }

    /// Bounded periods end at `now`; `All` is open on both sides.
    pub fn window_end(&self, now_ms: i64) -> Option<i64> {
        self.hours().map(|_| now_ms)
    }
}

impl std::str::FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(Period::Day),
            "7d" => Ok(Period::Week),
            "30d" => Ok(Period::Month),
            "all" => Ok(Period::All),
            other => Err(format!("unknown period '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelBand {
    Low,
    Medium,
    High,
}

impl LevelBand {
    pub fn classify(level_percent: f64, low: f64, medium: f64) -> Self {
        if level_percent < low {
            LevelBand::Low
        } else if level_percent < medium {
            LevelBand::Medium
        } else {
            LevelBand::High
        }
    }
}

/// The store's `latest` node: current level plus authoritative refill and
/// pump state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestSnapshot {
    pub level_percent: Option<f64>,
    pub timestamp_ms: Option<i64>,
    pub last_refill_timestamp_ms: Option<i64>,
    pub last_refill_level: Option<f64>,
    pub pump_is_on: bool,
}
