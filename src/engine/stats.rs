// Stats aggregator - Summary metrics for the current window
use crate::domain::dashboard::StatsSummary;
use crate::domain::events::RefillEvent;
use crate::domain::telemetry::DisplayPoint;
use chrono::DateTime;

pub const DEFAULT_EXPECTED_INTERVAL_HOURS: f64 = 72.0;

const HOUR_MS: f64 = 3_600_000.0;

/// Combine the window's points and inferred events into a summary.
///
/// `recorded_last_event` is the authoritative last refill timestamp from
/// the store; when absent the newest inferred event stands in. The next
/// expected refill is projected without clamping, so it may lie in the past.
pub fn aggregate(
    points: &[DisplayPoint],
    events: &[RefillEvent],
    recorded_last_event: Option<i64>,
    expected_interval_hours: f64,
) -> StatsSummary {
    let last_event_timestamp = recorded_last_event.or_else(|| {
        events
            .iter()
            .map(|e| e.timestamp_ms)
            .max()
    });

    StatsSummary {
        average_level: average_level(points),
        last_event_timestamp,
        next_expected_timestamp: last_event_timestamp
            .and_then(|last| project_next(last, expected_interval_hours)),
        total_events: events.len(),
    }
}

/// Mean of the valid levels rounded to one decimal; `0` when there are none.
fn average_level(points: &[DisplayPoint]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for point in points.iter().filter(|p| p.is_valid()) {
        sum += point.level_percent;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    ((sum / count as f64) * 10.0).round() / 10.0
}

fn project_next(last_ms: i64, expected_interval_hours: f64) -> Option<i64> {
    let offset = expected_interval_hours * HOUR_MS;
    if !offset.is_finite() || offset.abs() >= i64::MAX as f64 {
        return None;
    }
    let next = last_ms.checked_add(offset.round() as i64)?;
    // Must be representable as a calendar date.
    DateTime::from_timestamp_millis(next).map(|_| next)
}
