// Downsampler - Greedy gap-based reduction of raw readings to display points
use crate::domain::telemetry::{DisplayPoint, Reading};
use chrono::{TimeZone, Utc};

/// Series at or below this length are never reduced.
pub const PASS_THROUGH_MAX_LEN: usize = 50;

/// Buckets of at least this many hours leave the series untouched.
pub const PASS_THROUGH_BUCKET_HOURS: f64 = 24.0;

const HOUR_MS: f64 = 3_600_000.0;

/// Downsample with labels rendered in UTC.
pub fn downsample(readings: &[Reading], bucket_hours: f64) -> Vec<DisplayPoint> {
    downsample_in(readings, bucket_hours, &Utc)
}

/// Keep exact samples spaced at least `bucket_hours` apart.
///
/// Readings must be sorted ascending by timestamp. Malformed readings are
/// dropped before anything else. The first valid reading is always kept;
/// each later one is kept when it lies a full bucket after the last kept
/// reading. Retained points are never averaged or interpolated.
pub fn downsample_in<Tz>(readings: &[Reading], bucket_hours: f64, tz: &Tz) -> Vec<DisplayPoint>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let valid: Vec<&Reading> = readings.iter().filter(|r| r.is_valid()).collect();

    if valid.len() <= PASS_THROUGH_MAX_LEN
        || bucket_hours >= PASS_THROUGH_BUCKET_HOURS
        || bucket_hours.is_nan()
        || bucket_hours <= 0.0
    {
        return valid
            .into_iter()
            .map(|r| DisplayPoint::from_reading(r, tz))
            .collect();
    }

    let gap_ms = bucket_hours * HOUR_MS;
    let mut kept = Vec::new();
    let mut last_kept: Option<i64> = None;

    for reading in valid {
        let keep = match last_kept {
            None => true,
            Some(last) => (reading.timestamp_ms - last) as f64 >= gap_ms,
        };
        if keep {
            kept.push(DisplayPoint::from_reading(reading, tz));
            last_kept = Some(reading.timestamp_ms);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;
    const BASE: i64 = 1_700_000_000_000;

    fn every_ten_minutes(count: usize) -> Vec<Reading> {
        (0..count)
            .map(|i| Reading::new(BASE + i as i64 * 10 * MINUTE, 50.0 + (i % 7) as f64))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(downsample(&[], 1.0).is_empty());
    }

    #[test]
    fn test_small_series_passes_through() {
        let readings = every_ten_minutes(50);
        let points = downsample(&readings, 1.0);
        assert_eq!(points.len(), 50);
        assert_eq!(points[49].timestamp_ms, readings[49].timestamp_ms);
    }

    #[test]
    fn test_day_buckets_pass_through() {
        let readings = every_ten_minutes(200);
        assert_eq!(downsample(&readings, 24.0).len(), 200);
    }

    #[test]
    fn test_hourly_buckets() {
        // 120 readings over 20 hours, one every 10 minutes
        let readings = every_ten_minutes(120);
        let points = downsample(&readings, 1.0);

        assert_eq!(points.len(), 20);
        assert_eq!(points[0].timestamp_ms, BASE);
        for pair in points.windows(2) {
            assert_eq!(pair[1].timestamp_ms - pair[0].timestamp_ms, 60 * MINUTE);
        }
    }

    #[test]
    fn test_first_reading_kept_for_large_bucket() {
        // Timestamps smaller than the gap measured from epoch zero
        let readings: Vec<Reading> = (1..=60).map(|i| Reading::new(i * MINUTE, 10.0)).collect();
        let points = downsample(&readings, 12.0);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp_ms, MINUTE);
    }

    #[test]
    fn test_output_is_ordered_subsequence() {
        let mut readings = every_ten_minutes(300);
        readings[17].level_percent = 93.5;
        let points = downsample(&readings, 1.0);

        let mut cursor = readings.iter();
        for point in &points {
            let original = cursor
                .find(|r| r.timestamp_ms == point.timestamp_ms)
                .expect("point must come from the input in order");
            assert_eq!(original.level_percent, point.level_percent);
        }
        for pair in points.windows(2) {
            assert!(pair[0].timestamp_ms < pair[1].timestamp_ms);
        }
    }

    #[test]
    fn test_redownsampling_is_idempotent() {
        for hours in [1.0, 6.0, 0.5] {
            let readings = every_ten_minutes(1_000);
            let once = downsample(&readings, hours);
            let again: Vec<Reading> = once.iter().map(DisplayPoint::reading).collect();
            assert_eq!(downsample(&again, hours), once);
        }
    }

    #[test]
    fn test_malformed_readings_are_skipped() {
        let mut readings = every_ten_minutes(10);
        readings[3].level_percent = f64::NAN;
        readings[5].timestamp_ms = 0;
        let points = downsample(&readings, 1.0);
        assert_eq!(points.len(), 8);
        assert!(points.iter().all(|p| p.level_percent.is_finite()));

        let all_bad = vec![Reading::new(-1, 10.0), Reading::new(5, f64::NAN)];
        assert!(downsample(&all_bad, 1.0).is_empty());
    }

    #[test]
    fn test_labels_follow_timezone() {
        let readings = vec![Reading::new(1_709_296_200_000, 42.0)];
        let offset = chrono::FixedOffset::west_opt(3 * 3600).unwrap();
        let points = downsample_in(&readings, 1.0, &offset);
        assert_eq!(points[0].display_label, "01/03/2024 09:30");
    }
}
