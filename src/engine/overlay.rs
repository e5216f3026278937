// Overlay reconciler - Pairs start/end records into shaded intervals
//
// Pump records and refill records both reduce to a timestamp plus a
// `RecordBoundary`. Starts and ends are sorted independently, so the output
// never depends on the order the store happened to return records in.
use crate::domain::dashboard::OverlaySet;
use crate::domain::events::{
    Interval, PumpAction, PumpActivation, RecordBoundary, RefillRecord,
};

/// A record that can open or close an interval.
pub trait BoundaryRecord {
    fn timestamp_ms(&self) -> i64;
    fn boundary(&self) -> RecordBoundary;
}

impl BoundaryRecord for PumpActivation {
    fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    fn boundary(&self) -> RecordBoundary {
        RecordBoundary::IntervalBoundary {
            is_end: self.action == PumpAction::Deactivated,
        }
    }
}

impl BoundaryRecord for RefillRecord {
    fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    fn boundary(&self) -> RecordBoundary {
        self.boundary
    }
}

/// Turns sorted, deduplicated start and end timestamps into intervals.
pub trait PairingStrategy {
    fn pair(&self, starts: &[i64], ends: &[i64]) -> Vec<Interval>;
}

/// Each start pairs with the earliest end after it, unless another start
/// comes first. Unmatched starts yield nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestFollowing;

impl PairingStrategy for NearestFollowing {
    fn pair(&self, starts: &[i64], ends: &[i64]) -> Vec<Interval> {
        let mut intervals = Vec::new();

        for (i, &start) in starts.iter().enumerate() {
            let first_after = ends.partition_point(|&end| end <= start);
            let Some(&end) = ends.get(first_after) else {
                // No end follows this start, so none follows later ones either.
                break;
            };

            if let Some(&next_start) = starts.get(i + 1) {
                if next_start < end {
                    continue;
                }
            }

            if let Some(interval) = Interval::new(start, end) {
                intervals.push(interval);
            }
        }

        intervals
    }
}

/// Pair boundary records with the default nearest-following strategy.
pub fn reconcile_intervals<R: BoundaryRecord>(records: &[R]) -> Vec<Interval> {
    reconcile_intervals_with(records, &NearestFollowing)
}

pub fn reconcile_intervals_with<R, P>(records: &[R], strategy: &P) -> Vec<Interval>
where
    R: BoundaryRecord,
    P: PairingStrategy + ?Sized,
{
    let mut starts = Vec::new();
    let mut ends = Vec::new();

    for record in records.iter().filter(|r| r.timestamp_ms() > 0) {
        match record.boundary() {
            RecordBoundary::LegacyMarker => {}
            RecordBoundary::IntervalBoundary { is_end: false } => starts.push(record.timestamp_ms()),
            RecordBoundary::IntervalBoundary { is_end: true } => ends.push(record.timestamp_ms()),
        }
    }

    starts.sort_unstable();
    starts.dedup();
    ends.sort_unstable();
    ends.dedup();

    strategy.pair(&starts, &ends)
}

/// Ascending timestamps of records drawn as standalone markers.
pub fn legacy_markers<R: BoundaryRecord>(records: &[R]) -> Vec<i64> {
    let mut markers: Vec<i64> = records
        .iter()
        .filter(|r| r.timestamp_ms() > 0 && r.boundary() == RecordBoundary::LegacyMarker)
        .map(BoundaryRecord::timestamp_ms)
        .collect();
    markers.sort_unstable();
    markers.dedup();
    markers
}

/// Intervals plus standalone markers for one record kind.
pub fn build_overlay<R: BoundaryRecord>(records: &[R]) -> OverlaySet {
    OverlaySet {
        intervals: reconcile_intervals(records),
        markers: legacy_markers(records),
    }
}

/// Duration between an activation and the deactivation that closes it.
///
/// Callers must reject pairs whose deactivation does not postdate the
/// activation; this function does not validate.
pub fn pair_pump_duration(activation: &PumpActivation, deactivation: &PumpActivation) -> i64 {
    deactivation.timestamp_ms - activation.timestamp_ms
}
