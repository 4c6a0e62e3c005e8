//! E2E tests for configuration files and estimator construction

use audiolatency::audio::engine::{AudioEngine, EngineState};
use audiolatency::config::{ProbeConfig, TriggerConfig};
use audiolatency::{Config, ConfigError, LatencyEstimator, SimulatedLoopback};

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audiolatency").join("config.json");

    let config = Config {
        sample_rate: 96000,
        sma_window: 10,
        output_device: Some("Speakers".to_string()),
        input_device: Some("Line In".to_string()),
        trigger: TriggerConfig {
            threshold_ratio: 15.0,
            ..TriggerConfig::default()
        },
        probe: ProbeConfig {
            period_ms: 1000.0,
            ..ProbeConfig::default()
        },
    };
    config.save(&path).unwrap();
    assert!(path.exists());

    let loaded = Config::load(&path);
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{"sma_window": 2, "trigger": {"hold_ms": 120.0}}"#).unwrap();

    let config = Config::load(&path);
    assert_eq!(config.sma_window, 2);
    assert_eq!(config.sample_rate, 48000);
    assert_eq!(config.trigger.hold_ms, 120.0);
    assert_eq!(config.trigger.threshold_ratio, 10.0);
    assert_eq!(config.probe, ProbeConfig::default());
}

#[test]
fn test_estimator_uses_configured_window() {
    let config = Config {
        sma_window: 7,
        ..Config::default()
    };
    let est = LatencyEstimator::new(&config).unwrap();
    assert_eq!(est.window(), 7);
    assert_eq!(est.reports_emitted(), 0);
    assert!(!est.is_latched());
}

#[test]
fn test_invalid_config_rejected_by_estimator() {
    let config = Config {
        sma_window: 0,
        ..Config::default()
    };
    assert_eq!(
        LatencyEstimator::new(&config).unwrap_err(),
        ConfigError::InvalidWindow(0)
    );

    let mut config = Config::default();
    config.probe.burst_ms = config.probe.period_ms;
    assert!(SimulatedLoopback::new(&config, 0, 256).is_err());

    // Bursts closer than the debounce would be dropped without a report
    let mut config = Config::default();
    config.probe.period_ms = 200.0;
    assert!(matches!(
        SimulatedLoopback::new(&config, 600, 256),
        Err(ConfigError::ProbeTooFast { .. })
    ));
}

#[test]
fn test_engine_takes_config_sample_rate() {
    let engine = AudioEngine::new(Config {
        sample_rate: 44100,
        ..Config::default()
    });
    assert_eq!(engine.sample_rate(), 44100);
    assert_eq!(engine.state(), EngineState::Stopped);
}
