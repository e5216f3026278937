// Event detector - Infers refill events from level increases between points
use crate::domain::events::RefillEvent;
use crate::domain::telemetry::DisplayPoint;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_INCREASE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// One event per qualifying adjacent pair. A refill spread over several
    /// readings produces several events.
    #[default]
    PerStep,
    /// Consecutive qualifying steps merge into a single event spanning the
    /// whole rise, stamped at the step where the rise ends.
    CollapseRuns,
}

pub fn detect_events(points: &[DisplayPoint], min_increase: f64) -> Vec<RefillEvent> {
    detect_events_with(points, min_increase, DetectionMode::PerStep)
}

pub fn detect_events_with(
    points: &[DisplayPoint],
    min_increase: f64,
    mode: DetectionMode,
) -> Vec<RefillEvent> {
    let valid: Vec<&DisplayPoint> = points.iter().filter(|p| p.is_valid()).collect();
    if valid.len() < 2 {
        return Vec::new();
    }

    let mut events: Vec<RefillEvent> = Vec::new();
    // Index in `events` of the run the previous step belonged to.
    let mut open_run: Option<usize> = None;

    for pair in valid.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        let increase = current.level_percent - previous.level_percent;

        if increase < min_increase {
            open_run = None;
            continue;
        }

        match (mode, open_run) {
            (DetectionMode::CollapseRuns, Some(idx)) => {
                let run_start = events[idx];
                events[idx] = RefillEvent::new(
                    current.timestamp_ms,
                    run_start.previous_level,
                    current.level_percent,
                );
            }
            _ => {
                events.push(RefillEvent::new(
                    current.timestamp_ms,
                    previous.level_percent,
                    current.level_percent,
                ));
                open_run = Some(events.len() - 1);
            }
        }
    }

    events
}
