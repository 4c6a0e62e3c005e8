//! Playback/recording trigger pairing
//!
//! The playback callback and the recording callback each feed their buffers
//! into [`LatencyEstimator`]. Every call updates that direction's detector and
//! edge state; on a rising edge the estimator checks whether a playback onset
//! and a later recording onset form a new pair, and if so reports the elapsed
//! time and its moving average.
//!
//! ## Cycle latch
//!
//! Only one report is produced per playback activation. The latch is cleared
//! when the playback detector de-asserts. A recording de-assert leaves the
//! latch alone, so further recording onsets during the same playback
//! activation are ignored.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::detector::EnvelopeTrigger;
use super::trigger::{Direction, Edge, TriggerDetector, TriggerState};
use crate::config::{Config, ConfigError};
use crate::report::LatencyReport;
use crate::stats::sma::{MovingAverage, Smoother};

/// Edge bookkeeping for both directions plus the cycle latch
///
/// Pure state machine with no detectors, smoothing or locking, so the pairing
/// rules can be exercised directly.
///
/// # Example
/// ```
/// use audiolatency_core::audio::latency::PairingState;
/// use audiolatency_core::audio::trigger::Direction;
/// use std::time::Duration;
///
/// let mut state = PairingState::default();
/// assert_eq!(state.observe(Direction::Playback, true, 100), None);
/// assert_eq!(
///     state.observe(Direction::Recording, true, 135),
///     Some(Duration::from_nanos(35))
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairingState {
    playback: TriggerState,
    recording: TriggerState,
    /// Set once a report was produced for the current playback activation
    latched: bool,
}

impl PairingState {
    /// Feed one detector level and return the latency of a new pair, if any
    ///
    /// When a latency is returned the cycle latch is already set.
    pub fn observe(&mut self, direction: Direction, triggered: bool, ts: u64) -> Option<Duration> {
        let edge = match direction {
            Direction::Playback => self.playback.transition(triggered, ts),
            Direction::Recording => self.recording.transition(triggered, ts),
        };

        match edge {
            Edge::Rising(_) => self.check_triggers(),
            Edge::Falling => {
                if direction == Direction::Playback {
                    self.latched = false;
                }
                None
            }
            Edge::Steady => None,
        }
    }

    fn check_triggers(&mut self) -> Option<Duration> {
        let (Some(playback_ts), Some(recording_ts)) =
            (self.playback.timestamp(), self.recording.timestamp())
        else {
            return None;
        };

        if playback_ts >= recording_ts {
            return None;
        }

        if self.latched {
            return None;
        }

        self.latched = true;
        Some(Duration::from_nanos(recording_ts - playback_ts))
    }

    /// State of one direction
    pub fn direction(&self, direction: Direction) -> TriggerState {
        match direction {
            Direction::Playback => self.playback,
            Direction::Recording => self.recording,
        }
    }

    /// Whether a report was already produced for the current playback activation
    pub fn is_latched(&self) -> bool {
        self.latched
    }
}

/// Everything guarded by the estimator lock
#[derive(Debug)]
struct Inner<D, S> {
    output_trigger: D,
    input_trigger: D,
    pairing: PairingState,
    smoother: S,
    reports: u64,
}

impl<D: TriggerDetector, S: Smoother> Inner<D, S> {
    fn process(&mut self, direction: Direction, ts: u64, buf: &[i16]) -> Option<LatencyReport> {
        let trigger = match direction {
            Direction::Playback => &mut self.output_trigger,
            Direction::Recording => &mut self.input_trigger,
        };
        trigger.feed(ts, buf);
        let triggered = trigger.is_triggered();
        let trigger_ts = trigger.trigger_timestamp();

        let latency = self.pairing.observe(direction, triggered, trigger_ts)?;
        let avg_latency = self.smoother.add(latency);
        self.reports += 1;

        Some(LatencyReport {
            latency,
            avg_latency,
            window: self.smoother.window(),
        })
    }
}

/// Cross-stream latency estimator
///
/// Shared between the playback and recording threads (typically behind an
/// `Arc`). All state lives behind one mutex; each call holds it only for the
/// detector update, the edge check and the smoothing step.
///
/// # Example
/// ```
/// use audiolatency_core::{Config, LatencyEstimator};
///
/// let estimator = LatencyEstimator::new(&Config::default()).unwrap();
///
/// // 10ms of silence in both directions
/// assert!(estimator.add_output(0, &[0i16; 480]).is_none());
/// assert!(estimator.add_input(0, &[0i16; 480]).is_none());
/// assert_eq!(estimator.window(), 5);
/// ```
#[derive(Debug)]
pub struct LatencyEstimator<D = EnvelopeTrigger, S = MovingAverage> {
    inner: Mutex<Inner<D, S>>,
    window: usize,
}

impl LatencyEstimator {
    /// Create an estimator with envelope triggers and a moving average
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_parts(
            EnvelopeTrigger::new(config.sample_rate, &config.trigger),
            EnvelopeTrigger::new(config.sample_rate, &config.trigger),
            MovingAverage::new(config.sma_window)?,
        ))
    }
}

impl<D: TriggerDetector, S: Smoother> LatencyEstimator<D, S> {
    /// Create an estimator from explicit collaborators
    pub fn with_parts(output_trigger: D, input_trigger: D, smoother: S) -> Self {
        let window = smoother.window();
        Self {
            inner: Mutex::new(Inner {
                output_trigger,
                input_trigger,
                pairing: PairingState::default(),
                smoother,
                reports: 0,
            }),
            window,
        }
    }

    /// Feed a buffer written to the playback device
    ///
    /// # Arguments
    /// * `ts` - Timestamp (ns) of the first sample in `buf`
    /// * `buf` - Samples as sent to the device
    ///
    /// # Returns
    /// A report if this buffer completed a new playback/recording pair
    pub fn add_output(&self, ts: u64, buf: &[i16]) -> Option<LatencyReport> {
        self.add(Direction::Playback, ts, buf)
    }

    /// Feed a buffer captured from the recording device
    ///
    /// See [`add_output`](Self::add_output).
    pub fn add_input(&self, ts: u64, buf: &[i16]) -> Option<LatencyReport> {
        self.add(Direction::Recording, ts, buf)
    }

    // Runs on the audio callbacks: no logging here, reports are logged by
    // whoever drains them.
    fn add(&self, direction: Direction, ts: u64, buf: &[i16]) -> Option<LatencyReport> {
        self.lock().process(direction, ts, buf)
    }

    // The guarded state is consistent after every statement, so a panic on the
    // other thread leaves nothing half-updated.
    fn lock(&self) -> MutexGuard<'_, Inner<D, S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Smoothing window size
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of reports produced so far
    pub fn reports_emitted(&self) -> u64 {
        self.lock().reports
    }

    /// Whether the current playback activation was already reported
    pub fn is_latched(&self) -> bool {
        self.lock().pairing.is_latched()
    }

    /// Edge state of one direction
    pub fn direction_state(&self, direction: Direction) -> TriggerState {
        self.lock().pairing.direction(direction)
    }
}
