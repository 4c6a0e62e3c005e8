//! Per-direction trigger state
//!
//! A trigger detector reports a level ("currently triggered or not") after each
//! buffer. [`TriggerState`] turns that level into edges and latches the onset
//! timestamp on the rising edge only.

use std::fmt;

/// Stream direction a buffer or detector belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Samples written to the output device
    Playback,
    /// Samples captured from the input device
    Recording,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Playback => f.write_str("playback"),
            Direction::Recording => f.write_str("recording"),
        }
    }
}

/// Source of trigger levels for one stream direction
///
/// Implementations analyze timestamped sample buffers and report whether the
/// probe is currently present. They are fed from the audio callback while the
/// estimator lock is held, so `feed` must not block or allocate.
pub trait TriggerDetector: Send {
    /// Update detection state from a buffer whose first sample is at `ts` (ns)
    fn feed(&mut self, ts: u64, buf: &[i16]);

    /// Whether the probe is currently detected
    fn is_triggered(&self) -> bool;

    /// Timestamp (ns) of the sample that caused the current trigger
    ///
    /// Only meaningful while [`is_triggered`](Self::is_triggered) is true.
    fn trigger_timestamp(&self) -> u64;
}

/// Transition produced by feeding a detector level into [`TriggerState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Idle -> Triggered, with the latched onset timestamp
    Rising(u64),
    /// Triggered -> Idle
    Falling,
    /// No change
    Steady,
}

/// Edge-triggered state of one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerState {
    #[default]
    Idle,
    Triggered {
        /// Onset timestamp latched on the rising edge (ns)
        ts: u64,
    },
}

impl TriggerState {
    /// Advance the state from the detector's current level
    ///
    /// `trigger_ts` is read only on a rising edge; while already triggered the
    /// latched timestamp is kept even if the detector reports a different one.
    ///
    /// # Example
    /// ```
    /// use audiolatency_core::audio::trigger::{Edge, TriggerState};
    ///
    /// let mut state = TriggerState::Idle;
    /// assert_eq!(state.transition(true, 100), Edge::Rising(100));
    /// assert_eq!(state.transition(true, 200), Edge::Steady);
    /// assert_eq!(state.timestamp(), Some(100));
    /// assert_eq!(state.transition(false, 0), Edge::Falling);
    /// ```
    pub fn transition(&mut self, triggered: bool, trigger_ts: u64) -> Edge {
        match (*self, triggered) {
            (TriggerState::Idle, true) => {
                *self = TriggerState::Triggered { ts: trigger_ts };
                Edge::Rising(trigger_ts)
            }
            (TriggerState::Triggered { .. }, false) => {
                *self = TriggerState::Idle;
                Edge::Falling
            }
            _ => Edge::Steady,
        }
    }

    /// Whether this direction is currently triggered
    pub fn is_triggered(&self) -> bool {
        matches!(self, TriggerState::Triggered { .. })
    }

    /// Latched onset timestamp, if triggered
    pub fn timestamp(&self) -> Option<u64> {
        match self {
            TriggerState::Triggered { ts } => Some(*ts),
            TriggerState::Idle => None,
        }
    }
}
