// Telemetry data domain models
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A raw level sample as delivered by the reading store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp_ms: i64,
    pub level_percent: f64,
}

impl Reading {
    pub fn new(timestamp_ms: i64, level_percent: f64) -> Self {
        Self {
            timestamp_ms,
            level_percent,
        }
    }

    /// A reading is usable when its timestamp is a positive epoch value and
    /// its level is a finite number.
    pub fn is_valid(&self) -> bool {
        self.timestamp_ms > 0 && self.level_percent.is_finite()
    }
}

/// A reading retained for display, with a pre-formatted label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPoint {
    pub timestamp_ms: i64,
    pub level_percent: f64,
    pub display_label: String,
}

impl DisplayPoint {
    pub fn from_reading<Tz>(reading: &Reading, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self {
            timestamp_ms: reading.timestamp_ms,
            level_percent: reading.level_percent,
            display_label: format_label(reading.timestamp_ms, tz),
        }
    }

    pub fn reading(&self) -> Reading {
        Reading::new(self.timestamp_ms, self.level_percent)
    }

    pub fn is_valid(&self) -> bool {
        self.reading().is_valid()
    }
}

/// Format an epoch-ms timestamp as `dd/mm/yyyy HH:MM` in the given zone.
pub fn format_label<Tz>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
        Some(utc) => utc.with_timezone(tz).format("%d/%m/%Y %H:%M").to_string(),
        None => String::from("invalid date"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub x: i64,
    pub y: f64,
}

/// Endpoints of a least-squares line fitted over point indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendLine {
    pub start: TrendPoint,
    pub end: TrendPoint,
    /// Level change per point index.
    pub slope: f64,
    pub intercept: f64,
}

impl TrendLine {
    pub fn endpoints(&self) -> [TrendPoint; 2] {
        [self.start, self.end]
    }
}
