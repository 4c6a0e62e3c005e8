//! Audio processing module
//!
//! This module contains all audio-related functionality including:
//! - Per-direction trigger state and the detector contract ([`trigger`])
//! - Envelope-based burst detection ([`detector`])
//! - Playback/recording trigger pairing ([`latency`])
//! - Burst probe generation ([`burst`])
//! - Offline loopback simulation ([`loopback`])
//! - Audio device management ([`engine`])

pub mod burst;
pub mod detector;
pub mod engine;
pub mod latency;
pub mod loopback;
pub mod trigger;

/// Full-scale magnitude of an `i16` sample
pub const I16_FULL_SCALE: f32 = 32768.0;

/// Convert an `i16` sample to the `-1.0..1.0` range
#[inline]
pub fn sample_to_f32(sample: i16) -> f32 {
    sample as f32 / I16_FULL_SCALE
}

/// Convert a float sample to `i16`, saturating outside `-1.0..=1.0`
#[inline]
pub fn sample_from_f32(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * I16_FULL_SCALE) as i16
}
