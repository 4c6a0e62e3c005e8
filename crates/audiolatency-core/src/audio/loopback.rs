//! Offline loopback simulation
//!
//! Drives a [`LatencyEstimator`] without audio hardware: the burst generator
//! fills playback buffers, a delay line turns them into recording buffers a
//! fixed number of samples later, and both sides are stamped from one virtual
//! frame clock. Used by the `simulate` command, integration tests and
//! benchmarks.

use std::collections::VecDeque;

use super::burst::BurstGenerator;
use super::latency::LatencyEstimator;
use crate::config::{Config, ConfigError};
use crate::report::LatencyReport;
use crate::NANOS_PER_SEC;

/// Simulated playback -> recording path with a fixed delay
#[derive(Debug)]
pub struct SimulatedLoopback {
    estimator: LatencyEstimator,
    generator: BurstGenerator,
    /// Samples in flight between playback and recording
    delay_line: VecDeque<i16>,
    delay_samples: usize,
    sample_rate: u32,
    /// Frames processed per direction so far
    frame: u64,
    /// Peak of uniform noise added to the recording path (i16 units)
    noise_amplitude: f32,
    noise_seed: u32,
    output_buffer: Vec<i16>,
    input_buffer: Vec<i16>,
}

impl SimulatedLoopback {
    /// Create a loopback delaying the probe by `delay_samples`
    ///
    /// # Arguments
    /// * `config` - Estimator, detector and probe settings
    /// * `delay_samples` - Path delay in samples
    /// * `buffer_size` - Frames per simulated callback
    pub fn new(
        config: &Config,
        delay_samples: usize,
        buffer_size: usize,
    ) -> Result<Self, ConfigError> {
        let estimator = LatencyEstimator::new(config)?;
        let mut delay_line = VecDeque::with_capacity(delay_samples + buffer_size);
        delay_line.extend(std::iter::repeat(0i16).take(delay_samples));

        tracing::debug!(
            delay_samples,
            buffer_size,
            sample_rate = config.sample_rate,
            "loopback_created"
        );

        Ok(Self {
            estimator,
            generator: BurstGenerator::new(config.sample_rate, &config.probe),
            delay_line,
            delay_samples,
            sample_rate: config.sample_rate,
            frame: 0,
            noise_amplitude: 0.0,
            noise_seed: 0x1234_5678,
            output_buffer: vec![0; buffer_size.max(1)],
            input_buffer: vec![0; buffer_size.max(1)],
        })
    }

    /// Add uniform noise of the given peak (relative to full scale) to the
    /// recording path
    pub fn with_noise(mut self, amplitude: f32) -> Self {
        self.noise_amplitude = amplitude.clamp(0.0, 1.0) * i16::MAX as f32;
        self
    }

    fn timestamp(&self) -> u64 {
        (self.frame as u128 * NANOS_PER_SEC as u128 / self.sample_rate as u128) as u64
    }

    fn next_noise(&mut self) -> i16 {
        self.noise_seed = self.noise_seed.wrapping_mul(1103515245).wrapping_add(12345);
        let unit = ((self.noise_seed >> 16) & 0x7FFF) as f32 / 16384.0 - 1.0;
        (unit * self.noise_amplitude) as i16
    }

    /// Process one playback buffer and one recording buffer
    ///
    /// Returns the reports produced by the playback and recording calls.
    pub fn step(&mut self) -> (Option<LatencyReport>, Option<LatencyReport>) {
        let ts = self.timestamp();

        self.generator.fill_buffer(&mut self.output_buffer);
        let output_report = self.estimator.add_output(ts, &self.output_buffer);

        self.delay_line.extend(self.output_buffer.iter().copied());
        for i in 0..self.input_buffer.len() {
            let delayed = self.delay_line.pop_front().unwrap_or(0);
            let noise = if self.noise_amplitude > 0.0 {
                self.next_noise()
            } else {
                0
            };
            self.input_buffer[i] = delayed.saturating_add(noise);
        }
        let input_report = self.estimator.add_input(ts, &self.input_buffer);

        self.frame += self.output_buffer.len() as u64;
        (output_report, input_report)
    }

    /// Run `buffers` steps and collect every report
    pub fn run(&mut self, buffers: usize) -> Vec<LatencyReport> {
        let mut reports = Vec::new();
        for _ in 0..buffers {
            let (output, input) = self.step();
            reports.extend(output);
            reports.extend(input);
        }
        reports
    }

    /// Number of steps covering `seconds` of audio
    pub fn buffers_for(&self, seconds: f64) -> usize {
        (seconds * self.sample_rate as f64 / self.output_buffer.len() as f64).ceil() as usize
    }

    /// Configured path delay in samples
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Configured path delay in milliseconds
    pub fn delay_ms(&self) -> f64 {
        self.delay_samples as f64 * 1000.0 / self.sample_rate as f64
    }

    /// The estimator being driven
    pub fn estimator(&self) -> &LatencyEstimator {
        &self.estimator
    }
}
