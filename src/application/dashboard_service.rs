// Dashboard service - Use case for building the tank dashboard
use crate::application::cached_store::CachedReadingStore;
use crate::application::reading_store::StoreResult;
use crate::domain::dashboard::{OverlaySet, StatsSummary, TankDashboard};
use crate::domain::events::RefillEvent;
use crate::domain::tank::{LatestSnapshot, LevelBand, Period};
use crate::domain::telemetry::{DisplayPoint, Reading, TrendLine};
use crate::engine::{aggregate, build_overlay, detect_events_with, downsample_in, fit_trend};
use crate::infrastructure::config::{EngineSettings, LevelSettings};
use chrono::FixedOffset;
use std::sync::Arc;

pub const DEFAULT_RECENT_EVENTS: usize = 20;

/// Everything derived from a period's readings alone.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesAnalysis {
    pub points: Vec<DisplayPoint>,
    pub events: Vec<RefillEvent>,
    pub trend: Option<TrendLine>,
}

pub fn analyze_series(
    readings: &[Reading],
    period: Period,
    engine: &EngineSettings,
    offset: &FixedOffset,
) -> SeriesAnalysis {
    let points = downsample_in(readings, period.bucket_hours(), offset);
    let events = detect_events_with(&points, engine.min_increase, engine.detection_mode);
    let trend = fit_trend(&points);
    SeriesAnalysis {
        points,
        events,
        trend,
    }
}

pub fn summarize(
    analysis: &SeriesAnalysis,
    latest: Option<&LatestSnapshot>,
    engine: &EngineSettings,
) -> StatsSummary {
    aggregate(
        &analysis.points,
        &analysis.events,
        latest.and_then(|l| l.last_refill_timestamp_ms),
        engine.expected_interval_hours,
    )
}

#[derive(Clone)]
pub struct DashboardService {
    store: Arc<CachedReadingStore>,
    engine: EngineSettings,
    levels: LevelSettings,
    offset: FixedOffset,
}

impl DashboardService {
    pub fn new(
        store: Arc<CachedReadingStore>,
        engine: EngineSettings,
        levels: LevelSettings,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            engine,
            levels,
            offset,
        }
    }

    pub fn engine(&self) -> &EngineSettings {
        &self.engine
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    pub fn store(&self) -> &Arc<CachedReadingStore> {
        &self.store
    }

    /// Build the full dashboard. Only a failure to fetch readings is an
    /// error; the snapshot and overlays degrade to empty.
    pub async fn get_dashboard(&self, period: Period, now_ms: i64) -> StoreResult<TankDashboard> {
        let readings = self.store.readings_for(period, now_ms).await?;
        let latest = self.fetch_latest().await;

        let analysis = analyze_series(&readings, period, &self.engine, &self.offset);
        let stats = summarize(&analysis, latest.as_ref(), &self.engine);

        let current_level = latest
            .as_ref()
            .and_then(|l| l.level_percent)
            .or_else(|| analysis.points.last().map(|p| p.level_percent));

        let (pump_overlay, refill_overlay) = tokio::join!(
            self.pump_overlay(period, now_ms),
            self.refill_overlay(period, now_ms)
        );

        tracing::debug!(
            "Dashboard {}: {} readings -> {} points, {} events",
            period.as_str(),
            readings.len(),
            analysis.points.len(),
            analysis.events.len()
        );

        Ok(TankDashboard {
            period,
            overdue: stats.is_overdue(now_ms),
            current_band: current_level.map(|level| self.band(level)),
            pump_is_on: latest.as_ref().is_some_and(|l| l.pump_is_on),
            points: analysis.points,
            events: analysis.events,
            trend: analysis.trend,
            stats,
            pump_overlay,
            refill_overlay,
        })
    }

    /// Newest inferred events over all data, newest first.
    pub async fn recent_events(&self, limit: usize, now_ms: i64) -> StoreResult<Vec<RefillEvent>> {
        let readings = self.store.readings_for(Period::All, now_ms).await?;
        let analysis = analyze_series(&readings, Period::All, &self.engine, &self.offset);
        Ok(analysis.events.into_iter().rev().take(limit).collect())
    }

    pub fn band(&self, level_percent: f64) -> LevelBand {
        LevelBand::classify(level_percent, self.levels.low, self.levels.medium)
    }

    pub async fn fetch_latest(&self) -> Option<LatestSnapshot> {
        match self.store.latest().await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!("Error fetching latest snapshot: {}", e);
                None
            }
        }
    }

    pub async fn pump_overlay(&self, period: Period, now_ms: i64) -> OverlaySet {
        match self.store.pumps_for(period, now_ms).await {
            Ok(records) => build_overlay(records.as_slice()),
            Err(e) => {
                tracing::warn!("Error fetching pump records: {}", e);
                OverlaySet::default()
            }
        }
    }

    pub async fn refill_overlay(&self, period: Period, now_ms: i64) -> OverlaySet {
        match self.store.refills_for(period, now_ms).await {
            Ok(records) => build_overlay(records.as_slice()),
            Err(e) => {
                tracing::warn!("Error fetching refill records: {}", e);
                OverlaySet::default()
            }
        }
    }
}
