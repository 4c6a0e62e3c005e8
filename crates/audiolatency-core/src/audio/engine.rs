//! Audio engine for device management and stream handling
//!
//! Provides high-level interface for:
//! - Enumerating audio devices
//! - Opening playback and capture streams
//! - Feeding both callbacks into a shared [`LatencyEstimator`]
//!
//! ## Timestamps
//!
//! Both callbacks stamp their buffers from one `Instant` epoch. The playback
//! stamp is moved forward to cpal's estimated playback instant and the capture
//! stamp back to the estimated capture instant, so the estimator compares the
//! times the probe left and re-entered the device.
//!
//! Reports never leave the callback by logging; they are pushed into a bounded
//! channel and rendered by whoever drains [`AudioEngine::reports`].

use crate::audio::burst::BurstGenerator;
use crate::audio::latency::LatencyEstimator;
use crate::audio::{sample_from_f32, sample_to_f32};
use crate::config::Config;
use crate::report::LatencyReport;
use crate::NANOS_PER_SEC;
use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleRate, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Capacity of the report channel between callbacks and the consumer
const REPORT_CHANNEL_CAPACITY: usize = 64;

/// Frames converted per estimator call (scratch buffers are this long)
const SCRATCH_FRAMES: usize = 4096;

/// Errors that can occur during audio engine operations
#[derive(Error, Debug)]
pub enum AudioEngineError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("No output device available")]
    NoOutputDevice,

    #[error("No input device available")]
    NoInputDevice,

    #[error("Engine is already running")]
    AlreadyRunning,
}

/// Audio device information
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Device name
    pub name: String,
    /// Whether this is the default input or output device
    pub is_default: bool,
    /// Supported sample rates
    pub sample_rates: Vec<u32>,
    /// Number of input channels
    pub input_channels: u16,
    /// Number of output channels
    pub output_channels: u16,
}

/// Audio engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Engine is stopped
    Stopped,
    /// Engine is running and processing audio
    Running,
}

/// Nanoseconds elapsed since `epoch`
fn elapsed_ns(epoch: Instant) -> u64 {
    u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

fn frames_to_ns(frames: usize, sample_rate: u32) -> u64 {
    frames as u64 * NANOS_PER_SEC / sample_rate as u64
}

fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Forward a report out of a callback without blocking
fn publish(tx: &Sender<LatencyReport>, dropped: &AtomicU64, report: Option<LatencyReport>) {
    if let Some(report) = report {
        if tx.try_send(report).is_err() {
            dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Audio engine wiring device streams to the latency estimator
pub struct AudioEngine {
    state: EngineState,
    config: Config,
    host: Host,
    output_device: Option<Device>,
    input_device: Option<Device>,
    output_stream: Option<Stream>,
    input_stream: Option<Stream>,
    estimator: Option<Arc<LatencyEstimator>>,
    report_rx: Option<Receiver<LatencyReport>>,
    /// Running flag (shared with callbacks via Arc)
    running: Option<Arc<AtomicBool>>,
    /// Reports that did not fit into the channel
    dropped_reports: Arc<AtomicU64>,
}

impl AudioEngine {
    /// Create a new engine on the default host
    pub fn new(config: Config) -> Self {
        Self {
            state: EngineState::Stopped,
            config,
            host: cpal::default_host(),
            output_device: None,
            input_device: None,
            output_stream: None,
            input_stream: None,
            estimator: None,
            report_rx: None,
            running: None,
            dropped_reports: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get current engine state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Get configured sample rate
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// List available audio devices on the default host
    ///
    /// # Returns
    /// Vector of device information for all available devices
    pub fn list_devices() -> Result<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        let mut devices = Vec::new();

        let default_input = host.default_input_device().and_then(|d| d.name().ok());
        let default_output = host.default_output_device().and_then(|d| d.name().ok());

        for device in host.devices()? {
            let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

            let is_default = default_input.as_deref() == Some(name.as_str())
                || default_output.as_deref() == Some(name.as_str());

            let input_channels = device
                .default_input_config()
                .map(|c| c.channels())
                .unwrap_or(0);

            let output_channels = device
                .default_output_config()
                .map(|c| c.channels())
                .unwrap_or(0);

            // Common sample rates to check
            let common_rates = [44100, 48000, 88200, 96000, 176400, 192000];
            let mut sample_rates = Vec::new();

            if let Ok(configs) = device.supported_output_configs() {
                for config in configs {
                    for &rate in &common_rates {
                        if (config.min_sample_rate().0..=config.max_sample_rate().0).contains(&rate)
                            && !sample_rates.contains(&rate)
                        {
                            sample_rates.push(rate);
                        }
                    }
                }
            }

            sample_rates.sort();

            devices.push(DeviceInfo {
                name,
                is_default,
                sample_rates,
                input_channels,
                output_channels,
            });
        }

        Ok(devices)
    }

    fn find_device(&self, name: &str) -> Result<Device> {
        self.host
            .devices()?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| AudioEngineError::DeviceNotFound(name.to_string()).into())
    }

    /// Select the playback device by name
    pub fn select_output(&mut self, name: &str) -> Result<()> {
        self.output_device = Some(self.find_device(name)?);
        self.config.output_device = Some(name.to_string());
        Ok(())
    }

    /// Select the recording device by name
    pub fn select_input(&mut self, name: &str) -> Result<()> {
        self.input_device = Some(self.find_device(name)?);
        self.config.input_device = Some(name.to_string());
        Ok(())
    }

    /// Start audio processing
    ///
    /// Opens the playback and capture streams, writes the burst probe to the
    /// first output channel and feeds the first input channel to the
    /// estimator.
    pub fn start(&mut self) -> Result<()> {
        if self.state == EngineState::Running {
            return Err(AudioEngineError::AlreadyRunning.into());
        }

        if self.output_device.is_none() {
            if let Some(name) = self.config.output_device.clone() {
                self.select_output(&name)?;
            }
        }
        if self.input_device.is_none() {
            if let Some(name) = self.config.input_device.clone() {
                self.select_input(&name)?;
            }
        }

        if self.output_device.is_none() {
            self.output_device = Some(
                self.host
                    .default_output_device()
                    .ok_or(AudioEngineError::NoOutputDevice)?,
            );
        }
        if self.input_device.is_none() {
            self.input_device = Some(
                self.host
                    .default_input_device()
                    .ok_or(AudioEngineError::NoInputDevice)?,
            );
        }
        let (Some(output_device), Some(input_device)) = (&self.output_device, &self.input_device)
        else {
            return Err(anyhow!("No device selected"));
        };

        let sample_rate = self.config.sample_rate;
        let output_channels = output_device
            .default_output_config()
            .map(|c| c.channels())
            .unwrap_or(2)
            .max(1);
        let input_channels = input_device
            .default_input_config()
            .map(|c| c.channels())
            .unwrap_or(2)
            .max(1);

        tracing::info!(
            output = %output_device.name().unwrap_or_default(),
            input = %input_device.name().unwrap_or_default(),
            sample_rate,
            output_channels,
            input_channels,
            "Opening audio streams"
        );

        let output_config = StreamConfig {
            channels: output_channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let input_config = StreamConfig {
            channels: input_channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let estimator = Arc::new(
            LatencyEstimator::new(&self.config).map_err(|e| anyhow!("Invalid config: {}", e))?,
        );
        let (report_tx, report_rx) = crossbeam_channel::bounded(REPORT_CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let epoch = Instant::now();

        // Output stream - generator and scratch buffer owned by the closure
        let output_running = Arc::clone(&running);
        let output_estimator = Arc::clone(&estimator);
        let output_tx = report_tx.clone();
        let output_dropped = Arc::clone(&self.dropped_reports);
        let mut generator = BurstGenerator::new(sample_rate, &self.config.probe);
        let mut output_scratch = vec![0i16; SCRATCH_FRAMES];
        let num_output_channels = output_channels as usize;

        let output_stream = output_device.build_output_stream(
            &output_config,
            move |data: &mut [f32], info: &cpal::OutputCallbackInfo| {
                if !output_running.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }

                let stamp = info.timestamp();
                let lead = stamp
                    .playback
                    .duration_since(&stamp.callback)
                    .unwrap_or_default();
                let ts = elapsed_ns(epoch) + as_nanos(lead);

                let mut frames_done = 0;
                for chunk in data.chunks_mut(num_output_channels * SCRATCH_FRAMES) {
                    let frames = chunk.len() / num_output_channels;
                    let scratch = &mut output_scratch[..frames];
                    generator.fill_buffer(scratch);

                    for (frame, &sample) in chunk.chunks_mut(num_output_channels).zip(scratch.iter())
                    {
                        frame.fill(0.0);
                        frame[0] = sample_to_f32(sample);
                    }

                    let report = output_estimator
                        .add_output(ts + frames_to_ns(frames_done, sample_rate), scratch);
                    publish(&output_tx, &output_dropped, report);
                    frames_done += frames;
                }
            },
            move |err| {
                tracing::error!("Output stream error: {}", err);
            },
            None,
        )?;

        // Input stream - scratch buffer owned by the closure
        let input_running = Arc::clone(&running);
        let input_estimator = Arc::clone(&estimator);
        let input_tx = report_tx;
        let input_dropped = Arc::clone(&self.dropped_reports);
        let mut input_scratch = vec![0i16; SCRATCH_FRAMES];
        let num_input_channels = input_channels as usize;

        let input_stream = input_device.build_input_stream(
            &input_config,
            move |data: &[f32], info: &cpal::InputCallbackInfo| {
                if !input_running.load(Ordering::Relaxed) {
                    return;
                }

                let stamp = info.timestamp();
                let lag = stamp
                    .callback
                    .duration_since(&stamp.capture)
                    .unwrap_or_default();
                let ts = elapsed_ns(epoch).saturating_sub(as_nanos(lag));

                let mut frames_done = 0;
                for chunk in data.chunks(num_input_channels * SCRATCH_FRAMES) {
                    let frames = chunk.len() / num_input_channels;
                    let scratch = &mut input_scratch[..frames];

                    for (sample, frame) in scratch.iter_mut().zip(chunk.chunks(num_input_channels)) {
                        *sample = sample_from_f32(frame[0]);
                    }

                    let report = input_estimator
                        .add_input(ts + frames_to_ns(frames_done, sample_rate), scratch);
                    publish(&input_tx, &input_dropped, report);
                    frames_done += frames;
                }
            },
            move |err| {
                tracing::error!("Input stream error: {}", err);
            },
            None,
        )?;

        output_stream.play()?;
        input_stream.play()?;

        self.output_stream = Some(output_stream);
        self.input_stream = Some(input_stream);
        self.estimator = Some(estimator);
        self.report_rx = Some(report_rx);
        self.running = Some(running);
        self.state = EngineState::Running;

        tracing::info!(
            sample_rate,
            period_ms = self.config.probe.period_ms,
            sma_window = self.config.sma_window,
            "Audio engine started"
        );

        Ok(())
    }

    /// Stop audio processing
    pub fn stop(&mut self) -> Result<()> {
        if let Some(ref running) = self.running {
            running.store(false, Ordering::Relaxed);
        }

        self.input_stream = None;
        self.output_stream = None;
        self.running = None;
        self.state = EngineState::Stopped;

        tracing::info!(
            dropped_reports = self.dropped_reports(),
            "Audio engine stopped"
        );

        Ok(())
    }

    /// Receiver for reports produced by the audio callbacks
    pub fn reports(&self) -> Option<&Receiver<LatencyReport>> {
        self.report_rx.as_ref()
    }

    /// Estimator shared with the running callbacks
    pub fn estimator(&self) -> Option<&Arc<LatencyEstimator>> {
        self.estimator.as_ref()
    }

    /// Number of reports discarded because the channel was full
    pub fn dropped_reports(&self) -> u64 {
        self.dropped_reports.load(Ordering::Relaxed)
    }
}

impl Default for AudioEngine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if self.state == EngineState::Running {
            let _ = self.stop();
        }
    }
}
