//! Latency reports and their textual rendering
//!
//! The estimator only returns [`LatencyReport`] values; turning them into
//! text happens here, outside the estimator lock.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One paired playback/recording measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyReport {
    /// Recording onset minus playback onset
    pub latency: Duration,
    /// Moving average after adding `latency`
    pub avg_latency: Duration,
    /// Smoothing window used for `avg_latency`
    pub window: usize,
}

impl LatencyReport {
    /// Instantaneous latency in fractional milliseconds
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }

    /// Smoothed latency in fractional milliseconds
    pub fn avg_latency_ms(&self) -> f64 {
        self.avg_latency.as_secs_f64() * 1000.0
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "latency:  cur {:7.3}ms  avg{} {:7.3}ms",
            self.latency_ms(),
            self.window,
            self.avg_latency_ms()
        )
    }
}

/// Serialized form of a report for JSON-lines output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub latency_ms: f64,
    pub avg_latency_ms: f64,
    pub window: usize,
}

impl From<&LatencyReport> for ReportRecord {
    fn from(report: &LatencyReport) -> Self {
        Self {
            latency_ms: report.latency_ms(),
            avg_latency_ms: report.avg_latency_ms(),
            window: report.window,
        }
    }
}

/// Output format for rendered reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// `latency:  cur ...ms  avgN ...ms`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format: {other} (expected text or json)")),
        }
    }
}

/// Renders reports in a fixed format
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFormatter {
    format: ReportFormat,
}

impl ReportFormatter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Render a single report as one line (without trailing newline)
    pub fn render(&self, report: &LatencyReport) -> String {
        match self.format {
            ReportFormat::Text => report.to_string(),
            ReportFormat::Json => serde_json::to_string(&ReportRecord::from(report))
                .unwrap_or_else(|e| format!(r#"{{"error":"{e}"}}"#)),
        }
    }
}
