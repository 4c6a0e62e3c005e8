//! Envelope-based trigger detection
//!
//! Detects the onset of noise bursts in 16-bit audio using an envelope
//! follower with fast attack and slow release. The detector stays triggered
//! for at least the configured hold time after an onset, then releases once
//! the envelope falls below half the detection threshold.

use super::sample_to_f32;
use super::trigger::TriggerDetector;
use crate::config::TriggerConfig;
use crate::NANOS_PER_SEC;

/// Lowest noise floor used when computing the threshold
const MIN_NOISE_FLOOR: f32 = 0.001;

/// Envelope-based burst trigger
///
/// Uses an envelope follower with fast attack and slow release to detect
/// rising edges of noise bursts. The detector maintains state to track
/// the noise floor and detect when signal energy rises above a threshold.
///
/// # Example
/// ```
/// use audiolatency_core::audio::detector::EnvelopeTrigger;
/// use audiolatency_core::audio::trigger::TriggerDetector;
/// use audiolatency_core::config::TriggerConfig;
///
/// let mut trigger = EnvelopeTrigger::new(48000, &TriggerConfig::default());
///
/// trigger.feed(0, &[0i16; 480]);
/// assert!(!trigger.is_triggered());
///
/// // Burst starts with the next buffer, 10ms later
/// trigger.feed(10_000_000, &[16384i16; 480]);
/// assert!(trigger.is_triggered());
/// assert_eq!(trigger.trigger_timestamp(), 10_000_000);
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeTrigger {
    /// Sample rate in Hz
    sample_rate: u32,
    /// Current envelope level
    envelope: f32,
    /// Estimated noise floor
    noise_floor: f32,
    /// Threshold ratio above noise floor for detection
    threshold_ratio: f32,
    /// Whether we're currently in detected state (burst active)
    detected: bool,
    /// Attack coefficient (fast rise)
    attack_coeff: f32,
    /// Release coefficient (slow fall)
    release_coeff: f32,
    /// Noise floor adaptation coefficient
    noise_adapt_coeff: f32,
    /// Minimum samples the trigger stays asserted after onset
    hold_samples: usize,
    /// Minimum samples between onsets (debounce)
    min_gap_samples: usize,
    /// Samples since last onset
    samples_since_onset: usize,
    /// Timestamp of the last onset (ns)
    onset_ts: u64,
}

impl EnvelopeTrigger {
    /// Create a new trigger for the given sample rate and tuning
    pub fn new(sample_rate: u32, config: &TriggerConfig) -> Self {
        let min_gap_samples = Self::ms_to_samples(config.min_gap_ms, sample_rate);

        Self {
            sample_rate,
            envelope: 0.0,
            noise_floor: MIN_NOISE_FLOOR,
            threshold_ratio: config.threshold_ratio,
            detected: false,
            attack_coeff: Self::time_to_coeff(config.attack_ms, sample_rate),
            release_coeff: Self::time_to_coeff(config.release_ms, sample_rate),
            noise_adapt_coeff: Self::time_to_coeff(config.noise_adapt_ms, sample_rate),
            hold_samples: Self::ms_to_samples(config.hold_ms, sample_rate),
            min_gap_samples,
            samples_since_onset: min_gap_samples, // Allow immediate first detection
            onset_ts: 0,
        }
    }

    /// Convert time constant to exponential coefficient
    fn time_to_coeff(time_ms: f32, sample_rate: u32) -> f32 {
        let samples = time_ms * sample_rate as f32 / 1000.0;
        (-1.0 / samples).exp()
    }

    fn ms_to_samples(time_ms: f32, sample_rate: u32) -> usize {
        (time_ms as f64 * sample_rate as f64 / 1000.0) as usize
    }

    /// Offset in ns of the sample at `index` from the start of its buffer
    fn sample_offset_ns(&self, index: usize) -> u64 {
        index as u64 * NANOS_PER_SEC / self.sample_rate as u64
    }

    /// Process a single normalized sample
    ///
    /// Returns true if a burst onset was detected at this sample.
    pub fn process(&mut self, sample: f32) -> bool {
        let abs = sample.abs();
        self.samples_since_onset = self.samples_since_onset.saturating_add(1);

        if abs > self.envelope {
            self.envelope = self.envelope * self.attack_coeff + abs * (1.0 - self.attack_coeff);
        } else {
            self.envelope = self.envelope * self.release_coeff + abs * (1.0 - self.release_coeff);
        }

        let threshold = self.threshold();

        // Rising edge detection with debounce
        if !self.detected
            && self.envelope > threshold
            && self.samples_since_onset >= self.min_gap_samples
        {
            self.detected = true;
            self.samples_since_onset = 0;
            return true;
        }

        // Falling edge with hysteresis, not before the hold time has passed
        if self.detected
            && self.samples_since_onset >= self.hold_samples
            && self.envelope < threshold * 0.5
        {
            self.detected = false;
        }

        // Slowly adapt noise floor during non-burst periods
        if !self.detected {
            self.noise_floor =
                self.noise_floor * self.noise_adapt_coeff + abs * (1.0 - self.noise_adapt_coeff);
        }

        false
    }

    /// Get current envelope level
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Get current noise floor estimate
    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }

    /// Get detection threshold
    pub fn threshold(&self) -> f32 {
        self.noise_floor.max(MIN_NOISE_FLOOR) * self.threshold_ratio
    }

    /// Reset detector state
    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.noise_floor = MIN_NOISE_FLOOR;
        self.detected = false;
        self.samples_since_onset = self.min_gap_samples;
        self.onset_ts = 0;
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl TriggerDetector for EnvelopeTrigger {
    fn feed(&mut self, ts: u64, buf: &[i16]) {
        for (i, &sample) in buf.iter().enumerate() {
            if self.process(sample_to_f32(sample)) {
                self.onset_ts = ts + self.sample_offset_ns(i);
            }
        }
    }

    fn is_triggered(&self) -> bool {
        self.detected
    }

    fn trigger_timestamp(&self) -> u64 {
        self.onset_ts
    }
}
