//! Audiolatency - round-trip audio latency measurement
//!
//! This library re-exports the trigger pairing, smoothing, probe generation
//! and audio I/O functionality from `audiolatency-core`.

pub use audiolatency_core::audio;
pub use audiolatency_core::config;
pub use audiolatency_core::report;
pub use audiolatency_core::stats;

pub use audiolatency_core::{
    AudioEngine, BurstGenerator, Config, ConfigError, Direction, EnvelopeTrigger,
    LatencyEstimator, LatencyReport, LatencyStats, MovingAverage, ReportFormat, ReportFormatter,
    SimulatedLoopback, Smoother, TriggerDetector, TriggerState,
};
pub use audiolatency_core::{BUILD_DATE, DEFAULT_SAMPLE_RATE, DEFAULT_SMA_WINDOW, VERSION};
