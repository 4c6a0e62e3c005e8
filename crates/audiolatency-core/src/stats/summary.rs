//! Session-wide latency statistics
//!
//! Collected by the report consumer, never inside the estimator lock.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::report::LatencyReport;

/// Running statistics over every report of a session
#[derive(Debug, Clone)]
pub struct LatencyStats {
    /// When statistics collection started
    started_at: DateTime<Utc>,
    /// Number of reports recorded
    count: u64,
    /// Smallest instantaneous latency
    min: Option<Duration>,
    /// Largest instantaneous latency
    max: Option<Duration>,
    /// Most recent report
    last: Option<LatencyReport>,
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            count: 0,
            min: None,
            max: None,
            last: None,
        }
    }

    /// Record a report
    pub fn record(&mut self, report: &LatencyReport) {
        self.count += 1;
        self.min = Some(self.min.map_or(report.latency, |m| m.min(report.latency)));
        self.max = Some(self.max.map_or(report.latency, |m| m.max(report.latency)));
        self.last = Some(*report);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<Duration> {
        self.min
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }

    pub fn last(&self) -> Option<&LatencyReport> {
        self.last.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let ms = |d: Duration| d.as_secs_f64() * 1000.0;
        match (self.min, self.max, self.last.as_ref()) {
            (Some(min), Some(max), Some(last)) => format!(
                "{} reports since {}: min {:.3}ms  max {:.3}ms  avg{} {:.3}ms",
                self.count,
                self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
                ms(min),
                ms(max),
                last.window,
                last.avg_latency_ms()
            ),
            _ => format!(
                "no latency reports since {} (no valid trigger pairing observed)",
                self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        }
    }
}
