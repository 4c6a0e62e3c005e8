//! E2E tests for playback/recording trigger pairing
//!
//! Drives [`LatencyEstimator`] through its public API with a scripted
//! detector, so every onset timestamp is chosen by the test:
//! - Output buffer `[1]` raises the playback trigger, `[0]` drops it
//! - Input buffer `[1]` raises the recording trigger, `[0]` drops it
//! - The onset timestamp is the timestamp of the raising buffer

use audiolatency::{LatencyEstimator, LatencyReport, MovingAverage, Smoother, TriggerDetector};
use std::time::Duration;

const MS: u64 = 1_000_000;
const ON: &[i16] = &[1];
const OFF: &[i16] = &[0];

#[derive(Debug, Default)]
struct ScriptedTrigger {
    triggered: bool,
    onset: u64,
}

impl TriggerDetector for ScriptedTrigger {
    fn feed(&mut self, ts: u64, buf: &[i16]) {
        let level = buf.first().copied().unwrap_or(0) != 0;
        if level && !self.triggered {
            self.onset = ts;
        }
        self.triggered = level;
    }

    fn is_triggered(&self) -> bool {
        self.triggered
    }

    fn trigger_timestamp(&self) -> u64 {
        self.onset
    }
}

fn estimator(window: usize) -> LatencyEstimator<ScriptedTrigger, MovingAverage> {
    LatencyEstimator::with_parts(
        ScriptedTrigger::default(),
        ScriptedTrigger::default(),
        MovingAverage::new(window).unwrap(),
    )
}

/// Run one full measurement cycle and return the report, if any
fn cycle(
    est: &LatencyEstimator<ScriptedTrigger, MovingAverage>,
    playback_ts: u64,
    recording_ts: u64,
) -> Option<LatencyReport> {
    let mut report = est.add_output(playback_ts, ON);
    report = report.or(est.add_input(recording_ts, ON));
    est.add_output(recording_ts + 50 * MS, OFF);
    est.add_input(recording_ts + 60 * MS, OFF);
    report
}

/// Playback at 100ms, recording at 135ms, then 300ms/330ms with window 2
#[test]
fn test_reference_scenario() {
    let est = estimator(2);

    let first = cycle(&est, 100 * MS, 135 * MS).expect("first pair");
    assert_eq!(first.latency, Duration::from_millis(35));
    assert_eq!(first.avg_latency, Duration::from_millis(35));
    assert_eq!(first.to_string(), "latency:  cur  35.000ms  avg2  35.000ms");

    let second = cycle(&est, 300 * MS, 330 * MS).expect("second pair");
    assert_eq!(second.latency, Duration::from_millis(30));
    assert_eq!(second.avg_latency, Duration::from_micros(32_500));
    assert_eq!(second.to_string(), "latency:  cur  30.000ms  avg2  32.500ms");
}

/// First report equals its own latency for any window size
#[test]
fn test_first_report_independent_of_window() {
    for window in [1, 2, 5, 64] {
        let est = estimator(window);
        let report = cycle(&est, 100 * MS, 135 * MS).unwrap();
        assert_eq!(report.avg_latency, Duration::from_millis(35));
        assert_eq!(report.window, window);
    }
}

/// Smoothed value follows the moving average over the last min(count, W) latencies
#[test]
fn test_smoothing_over_scripted_latencies() {
    let latencies_ms = [35u64, 30, 41, 12, 18, 25, 33, 7, 50, 21];

    for window in [1usize, 3, 4, 10] {
        let est = estimator(window);
        let mut seen = Vec::new();

        for (k, &latency) in latencies_ms.iter().enumerate() {
            let start = k as u64 * 1000 * MS;
            let report = cycle(&est, start, start + latency * MS).unwrap();
            seen.push(latency * MS);

            let tail = &seen[seen.len().saturating_sub(window)..];
            let expected = tail.iter().sum::<u64>() / tail.len() as u64;

            assert_eq!(report.latency, Duration::from_millis(latency));
            assert_eq!(
                report.avg_latency,
                Duration::from_nanos(expected),
                "window {} after {} reports",
                window,
                k + 1
            );
        }
    }
}

/// Every report satisfies recording > playback and latency = difference
#[test]
fn test_causality_over_mixed_orders() {
    let est = estimator(4);
    let pairs: [(u64, u64); 6] = [
        (100, 135),
        (400, 380),
        (700, 700),
        (1000, 1001),
        (1300, 1200),
        (1600, 1650),
    ];
    let mut reported = Vec::new();

    for &(playback, recording) in &pairs {
        // Deliver in both orders across the cycles
        let report = if playback < recording {
            est.add_output(playback * MS, ON).or(est.add_input(recording * MS, ON))
        } else {
            est.add_input(recording * MS, ON).or(est.add_output(playback * MS, ON))
        };
        if let Some(report) = report {
            assert!(recording > playback);
            assert_eq!(report.latency, Duration::from_millis(recording - playback));
            reported.push(recording - playback);
        }
        est.add_output((playback.max(recording) + 100) * MS, OFF);
        est.add_input((playback.max(recording) + 110) * MS, OFF);
    }

    assert_eq!(reported, vec![35, 1, 50]);
}

/// Recording keeps re-triggering during one playback activation
#[test]
fn test_single_report_per_activation() {
    let est = estimator(3);
    est.add_output(0, ON);

    let reports: Vec<_> = (1..=10u64)
        .filter_map(|n| {
            let report = est.add_input(n * 20 * MS, ON);
            est.add_input(n * 20 * MS + 10 * MS, OFF);
            report
        })
        .collect();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].latency, Duration::from_millis(20));
}

/// A new playback activation may report again
#[test]
fn test_rearm_after_playback_release() {
    let est = estimator(3);
    est.add_output(0, ON);
    assert!(est.add_input(20 * MS, ON).is_some());
    est.add_input(30 * MS, OFF);

    est.add_output(100 * MS, OFF);
    est.add_output(200 * MS, ON);
    let report = est.add_input(215 * MS, ON).expect("new activation should report");
    assert_eq!(report.latency, Duration::from_millis(15));
    assert_eq!(report.avg_latency, Duration::from_micros(17_500));
}

/// Both directions triggered but recording onset is older than playback onset
#[test]
fn test_stale_recording_rejected() {
    let est = estimator(1);
    est.add_input(50 * MS, ON);
    assert!(est.add_output(80 * MS, ON).is_none());
    // Recording stays triggered; no new edge so no retry
    assert!(est.add_input(90 * MS, ON).is_none());
    assert_eq!(est.reports_emitted(), 0);
}

/// Custom smoother plugged into the estimator
#[test]
fn test_custom_smoother() {
    #[derive(Debug)]
    struct MaxHold(Duration);

    impl Smoother for MaxHold {
        fn add(&mut self, sample: Duration) -> Duration {
            self.0 = self.0.max(sample);
            self.0
        }

        fn window(&self) -> usize {
            1
        }
    }

    let est = LatencyEstimator::with_parts(
        ScriptedTrigger::default(),
        ScriptedTrigger::default(),
        MaxHold(Duration::ZERO),
    );

    est.add_output(0, ON);
    assert_eq!(
        est.add_input(40 * MS, ON).unwrap().avg_latency,
        Duration::from_millis(40)
    );
    est.add_output(100 * MS, OFF);
    est.add_input(100 * MS, OFF);
    est.add_output(200 * MS, ON);
    let report = est.add_input(210 * MS, ON).unwrap();
    assert_eq!(report.latency, Duration::from_millis(10));
    assert_eq!(report.avg_latency, Duration::from_millis(40));
}
