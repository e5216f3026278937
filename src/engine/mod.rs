// Engine - Pure time-series processing and event detection
//
// Every function here is synchronous and stateless; parameters such as the
// bucket width or detection threshold are always passed in by the caller.
pub mod downsampler;
pub mod event_detector;
pub mod overlay;
pub mod stats;
pub mod trend;

pub use downsampler::{downsample, downsample_in};
pub use event_detector::{detect_events, detect_events_with, DetectionMode};
pub use overlay::{
    build_overlay, legacy_markers, pair_pump_duration, reconcile_intervals,
    reconcile_intervals_with, BoundaryRecord, NearestFollowing, PairingStrategy,
};
pub use stats::aggregate;
pub use trend::fit_trend;
