//! Latency smoothing and session statistics

pub mod sma;
pub mod summary;
