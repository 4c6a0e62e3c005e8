//! Burst probe generation
//!
//! Generates a short burst of white noise at the start of every period,
//! followed by silence. The envelope triggers on both sides of the audio
//! path key on the burst onset.

use crate::config::ProbeConfig;

/// Burst signal generator for latency measurement
///
/// # Example
/// ```
/// use audiolatency_core::audio::burst::BurstGenerator;
/// use audiolatency_core::config::ProbeConfig;
///
/// let gen = BurstGenerator::new(48000, &ProbeConfig::default());
/// assert_eq!(gen.cycle_length(), 24000); // 500ms at 48kHz
/// assert_eq!(gen.burst_length(), 480); // 10ms at 48kHz
/// ```
#[derive(Debug, Clone)]
pub struct BurstGenerator {
    /// Sample rate in Hz
    sample_rate: u32,
    /// Total cycle length in samples
    cycle_length: usize,
    /// Number of noise samples at the start of each cycle
    burst_length: usize,
    /// Current position in cycle (0..cycle_length)
    cycle_position: usize,
    /// PRNG state for noise generation
    noise_seed: u32,
    /// Peak amplitude in i16 units
    amplitude: f32,
}

impl BurstGenerator {
    /// Create a new burst generator
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `probe` - Period, burst length and amplitude
    pub fn new(sample_rate: u32, probe: &ProbeConfig) -> Self {
        let ms_to_samples = |ms: f32| (ms as f64 * sample_rate as f64 / 1000.0) as usize;
        let cycle_length = ms_to_samples(probe.period_ms).max(2);
        let burst_length = ms_to_samples(probe.burst_ms).clamp(1, cycle_length - 1);

        Self {
            sample_rate,
            cycle_length,
            burst_length,
            cycle_position: 0,
            noise_seed: 0xDEADBEEF,
            amplitude: probe.amplitude.clamp(0.0, 1.0) * i16::MAX as f32,
        }
    }

    /// Get the next sample from the generator
    ///
    /// Returns a tuple of (sample, is_burst_start).
    pub fn next_sample(&mut self) -> (i16, bool) {
        let is_burst_start = self.cycle_position == 0;

        let sample = if self.cycle_position < self.burst_length {
            let noise = self.generate_noise();
            // Keep every burst sample away from zero so the onset is sharp
            let shaped = noise.signum() * (0.25 + 0.75 * noise.abs());
            (shaped * self.amplitude) as i16
        } else {
            0
        };

        self.cycle_position = (self.cycle_position + 1) % self.cycle_length;
        (sample, is_burst_start)
    }

    /// Generate a single noise sample in -1.0..1.0 using an LCG
    fn generate_noise(&mut self) -> f32 {
        // LCG parameters (same as glibc)
        self.noise_seed = self.noise_seed.wrapping_mul(1103515245).wrapping_add(12345);
        let bits = (self.noise_seed >> 16) & 0x7FFF;
        (bits as f32 / 16384.0) - 1.0
    }

    /// Fill a buffer with sequential samples
    ///
    /// Returns the number of bursts that started within this buffer.
    pub fn fill_buffer(&mut self, buffer: &mut [i16]) -> usize {
        let mut burst_starts = 0;
        for sample in buffer.iter_mut() {
            let (s, is_start) = self.next_sample();
            *sample = s;
            if is_start {
                burst_starts += 1;
            }
        }
        burst_starts
    }

    /// Cycle length in samples
    pub fn cycle_length(&self) -> usize {
        self.cycle_length
    }

    /// Burst length in samples
    pub fn burst_length(&self) -> usize {
        self.burst_length
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Restart at the beginning of a burst
    pub fn reset(&mut self) {
        self.cycle_position = 0;
        self.noise_seed = 0xDEADBEEF;
    }
}
