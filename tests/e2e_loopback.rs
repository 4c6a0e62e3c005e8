//! E2E tests for the full probe path
//!
//! Burst generator -> delay line -> envelope triggers -> estimator, using
//! [`SimulatedLoopback`] so the expected latency is known exactly.

use approx::assert_abs_diff_eq;
use audiolatency::config::{ProbeConfig, TriggerConfig};
use audiolatency::{BurstGenerator, Config, EnvelopeTrigger, SimulatedLoopback, TriggerDetector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

/// Counts every event that reaches the subscriber, at any level
struct EventCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for EventCounter {
    fn on_event(&self, _event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Generator and detector agree on one onset per probe period
#[test]
fn test_one_onset_per_burst() {
    let probe = ProbeConfig::default();
    let mut gen = BurstGenerator::new(48000, &probe);
    let mut trigger = EnvelopeTrigger::new(48000, &TriggerConfig::default());

    let mut buffer = vec![0i16; 480];
    let mut onsets = Vec::new();
    let mut was_triggered = false;

    // 5 seconds in 10ms buffers
    for n in 0..500u64 {
        gen.fill_buffer(&mut buffer);
        trigger.feed(n * 10_000_000, &buffer);
        if trigger.is_triggered() && !was_triggered {
            onsets.push(trigger.trigger_timestamp());
        }
        was_triggered = trigger.is_triggered();
    }

    assert_eq!(onsets.len(), 10, "Expected 10 onsets, got {:?}", onsets);
    for (k, &onset) in onsets.iter().enumerate() {
        let expected = k as u64 * 500_000_000;
        // Attack settles within a few samples of the burst start
        assert!(
            onset >= expected && onset - expected < 200_000,
            "Onset {} at {}ns, burst started at {}ns",
            k,
            onset,
            expected
        );
    }
}

/// Silence never produces a report
#[test]
fn test_no_reports_without_probe() {
    let mut config = Config::default();
    config.probe.amplitude = 0.0;
    let mut loopback = SimulatedLoopback::new(&config, 480, 256).unwrap();
    assert!(loopback.run(loopback.buffers_for(2.0)).is_empty());
}

/// Delay recovered across sample rates and callback sizes
#[test]
fn test_delay_recovered_across_rates_and_buffers() {
    let cases = [
        (44100u32, 64usize, 441usize),
        (48000, 256, 600),
        (48000, 1024, 2400),
        (96000, 512, 9600),
        (96000, 128, 17),
    ];

    for &(rate, buffer, delay) in &cases {
        let config = Config {
            sample_rate: rate,
            ..Config::default()
        };
        let mut loopback = SimulatedLoopback::new(&config, delay, buffer).unwrap();
        let expected_ms = delay as f64 * 1000.0 / rate as f64;

        let reports = loopback.run(loopback.buffers_for(2.2));
        assert!(
            reports.len() >= 4,
            "rate {} buffer {} delay {}: only {} reports",
            rate,
            buffer,
            delay,
            reports.len()
        );
        for report in &reports {
            assert_abs_diff_eq!(report.latency_ms(), expected_ms, epsilon = 0.001);
        }
    }
}

/// Average converges over the configured window
#[test]
fn test_average_matches_latency_for_constant_delay() {
    let config = Config {
        sma_window: 3,
        ..Config::default()
    };
    let mut loopback = SimulatedLoopback::new(&config, 960, 256).unwrap();
    let reports = loopback.run(loopback.buffers_for(3.0));

    assert!(!reports.is_empty());
    let last = reports.last().unwrap();
    assert_eq!(last.window, 3);
    assert_abs_diff_eq!(last.avg_latency_ms(), 20.0, epsilon = 0.001);
    assert_eq!(
        loopback.estimator().reports_emitted(),
        reports.len() as u64
    );
}

/// Moderate noise on the recording path shifts the onset by a few samples at most
#[test]
fn test_noisy_recording_path() {
    let config = Config::default();
    let mut loopback = SimulatedLoopback::new(&config, 1200, 256)
        .unwrap()
        .with_noise(0.005);

    let reports = loopback.run(loopback.buffers_for(3.0));
    assert!(reports.len() >= 4, "only {} reports", reports.len());
    for report in &reports {
        assert_abs_diff_eq!(report.latency_ms(), 25.0, epsilon = 0.5);
    }
}

/// Producer calls run on the audio callbacks and must not log, even at trace level
#[test]
fn test_measurement_path_emits_no_log_events() {
    let mut loopback = SimulatedLoopback::new(&Config::default(), 600, 256).unwrap();
    let buffers = loopback.buffers_for(3.0);

    let events = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(EventCounter(Arc::clone(&events)));

    let reports = tracing::subscriber::with_default(subscriber, || {
        tracing::trace!("counter_armed");
        loopback.run(buffers)
    });

    assert!(!reports.is_empty());
    assert_eq!(events.load(Ordering::SeqCst), 1, "only the arming event is expected");
}
