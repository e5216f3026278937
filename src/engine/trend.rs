// Trend estimator - Least-squares line of level against point index
use crate::domain::telemetry::{DisplayPoint, TrendLine, TrendPoint};

/// Fit `level = intercept + slope * index` over the valid points.
///
/// Returns `None` for fewer than two points. Sums accumulate left to right
/// so identical input yields bit-identical output.
pub fn fit_trend(points: &[DisplayPoint]) -> Option<TrendLine> {
    let valid: Vec<&DisplayPoint> = points.iter().filter(|p| p.is_valid()).collect();
    let n = valid.len();
    if n < 2 {
        return None;
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_xx = 0.0;
    for (i, point) in valid.iter().enumerate() {
        let x = i as f64;
        let y = point.level_percent;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let n_f = n as f64;
    let denominator = n_f * sum_xx - sum_x * sum_x;
    let slope = (n_f * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n_f;

    let first = valid[0];
    let last = valid[n - 1];

    Some(TrendLine {
        start: TrendPoint {
            x: first.timestamp_ms,
            y: intercept,
        },
        end: TrendPoint {
            x: last.timestamp_ms,
            y: intercept + slope * (n_f - 1.0),
        },
        slope,
        intercept,
    })
}
