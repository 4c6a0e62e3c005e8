//! Audiolatency Core - trigger pairing, smoothing, probe generation and audio I/O
//!
//! This library measures round-trip latency between a playback stream and a
//! recording stream. A periodic noise burst is written to the output, detected
//! again in the input, and the two detections are paired by
//! [`LatencyEstimator`] to produce latency reports.

pub mod audio;
pub mod config;
pub mod report;
pub mod stats;

pub use audio::{
    burst::BurstGenerator,
    detector::EnvelopeTrigger,
    engine::AudioEngine,
    latency::LatencyEstimator,
    loopback::SimulatedLoopback,
    trigger::{Direction, TriggerDetector, TriggerState},
};
pub use config::{Config, ConfigError};
pub use report::{LatencyReport, ReportFormat, ReportFormatter};
pub use stats::{sma::MovingAverage, sma::Smoother, summary::LatencyStats};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Date the crate was built (set by build.rs)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Default sample rate for audio processing
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default smoothing window (number of latency reports averaged)
pub const DEFAULT_SMA_WINDOW: usize = 5;

/// Nanoseconds per second, used for timestamp arithmetic
pub const NANOS_PER_SEC: u64 = 1_000_000_000;
