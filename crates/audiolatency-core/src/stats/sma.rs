//! Fixed-window latency smoothing

use crate::config::ConfigError;
use std::time::Duration;

/// Smoothing filter applied to successive latency measurements
pub trait Smoother: Send {
    /// Add a measurement and return the updated smoothed value
    fn add(&mut self, sample: Duration) -> Duration;

    /// Number of measurements the filter averages over
    fn window(&self) -> usize;
}

/// Simple moving average over the last `window` durations
///
/// Storage is allocated once at construction, so [`add`](Smoother::add) is
/// safe to call from an audio callback. Before the window fills, the average
/// covers the samples seen so far.
///
/// # Example
/// ```
/// use audiolatency_core::stats::sma::{MovingAverage, Smoother};
/// use std::time::Duration;
///
/// let mut sma = MovingAverage::new(2).unwrap();
/// assert_eq!(sma.add(Duration::from_millis(35)), Duration::from_millis(35));
/// assert_eq!(sma.add(Duration::from_millis(30)), Duration::from_micros(32_500));
/// ```
#[derive(Debug, Clone)]
pub struct MovingAverage {
    /// Ring of the most recent samples in nanoseconds
    samples: Vec<u64>,
    /// Next slot to overwrite
    next: usize,
    /// Number of valid samples (saturates at window)
    count: usize,
    /// Sum of valid samples in nanoseconds
    sum: u128,
}

impl MovingAverage {
    /// Create a moving average over `window` samples
    pub fn new(window: usize) -> Result<Self, ConfigError> {
        if window == 0 {
            return Err(ConfigError::InvalidWindow(window));
        }
        Ok(Self {
            samples: vec![0; window],
            next: 0,
            count: 0,
            sum: 0,
        })
    }

    /// Number of samples currently averaged
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether no sample was added yet
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Current average, or zero when empty
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.sum / self.count as u128;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl Smoother for MovingAverage {
    fn add(&mut self, sample: Duration) -> Duration {
        let nanos = u64::try_from(sample.as_nanos()).unwrap_or(u64::MAX);

        if self.count == self.samples.len() {
            self.sum -= self.samples[self.next] as u128;
        } else {
            self.count += 1;
        }
        self.samples[self.next] = nanos;
        self.sum += nanos as u128;
        self.next = (self.next + 1) % self.samples.len();

        self.average()
    }

    fn window(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_zero_window_rejected() {
        assert_eq!(
            MovingAverage::new(0).unwrap_err(),
            ConfigError::InvalidWindow(0)
        );
    }

    #[test]
    fn test_partial_window_averages_seen_samples() {
        let mut sma = MovingAverage::new(4).unwrap();
        assert!(sma.is_empty());
        assert_eq!(sma.average(), Duration::ZERO);

        assert_eq!(sma.add(ms(10)), ms(10));
        assert_eq!(sma.add(ms(20)), ms(15));
        assert_eq!(sma.add(ms(30)), ms(20));
        assert_eq!(sma.len(), 3);
    }

    #[test]
    fn test_full_window_drops_oldest() {
        let mut sma = MovingAverage::new(3).unwrap();
        let latencies = [10, 20, 30, 40, 50, 60, 70];
        let expected = [10, 15, 20, 30, 40, 50, 60];

        for (&latency, &want) in latencies.iter().zip(expected.iter()) {
            assert_eq!(sma.add(ms(latency)), ms(want));
        }
        assert_eq!(sma.len(), 3);
        assert_eq!(sma.window(), 3);
    }

    #[test]
    fn test_window_of_one_tracks_last_sample() {
        let mut sma = MovingAverage::new(1).unwrap();
        assert_eq!(sma.add(ms(35)), ms(35));
        assert_eq!(sma.add(ms(30)), ms(30));
    }

    #[test]
    fn test_sub_millisecond_precision() {
        let mut sma = MovingAverage::new(2).unwrap();
        sma.add(Duration::from_nanos(1_000_001));
        let avg = sma.add(Duration::from_nanos(1_000_002));
        // Integer division truncates the half nanosecond
        assert_eq!(avg, Duration::from_nanos(1_000_001));
    }
}
