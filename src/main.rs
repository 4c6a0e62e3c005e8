//! Audiolatency - round-trip audio latency measurement
//!
//! Entry point for the command line tool.

use anyhow::{Context, Result};
use audiolatency::audio::engine::AudioEngine;
use audiolatency::{
    Config, LatencyReport, LatencyStats, ReportFormat, ReportFormatter, SimulatedLoopback,
};
use clap::{ArgAction, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "audiolatency", version = audiolatency::VERSION, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of reports averaged into the smoothed latency
    #[arg(short = 'w', long, global = true)]
    sma_window: Option<usize>,

    /// Sample rate in Hz
    #[arg(short = 'r', long, global = true)]
    sample_rate: Option<u32>,

    /// Report format: text or json
    #[arg(short, long, global = true, default_value = "text")]
    format: ReportFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List available audio devices
    List,
    /// Measure latency through real playback and recording devices
    Run {
        /// Playback device name
        #[arg(short, long)]
        output_device: Option<String>,
        /// Recording device name
        #[arg(short, long)]
        input_device: Option<String>,
        /// Stop after this many seconds (runs until Ctrl+C otherwise)
        #[arg(short, long)]
        duration_s: Option<f64>,
    },
    /// Measure latency through a simulated loopback with a fixed delay
    Simulate {
        /// Simulated path delay in milliseconds
        #[arg(short, long)]
        delay_ms: f64,
        /// Length of the simulated session in seconds
        #[arg(long, default_value_t = 5.0)]
        duration_s: f64,
        /// Frames per simulated callback
        #[arg(short, long, default_value_t = 256)]
        buffer_size: usize,
        /// Peak of uniform noise added to the recording path (0.0..1.0)
        #[arg(short, long, default_value_t = 0.0)]
        noise: f32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("audiolatency={level}").parse()?)
                .add_directive(format!("audiolatency_core={level}").parse()?),
        )
        .init();

    info!(
        version = audiolatency::VERSION,
        build_date = audiolatency::BUILD_DATE,
        "audiolatency starting"
    );

    let config = load_config(&cli)?;
    let formatter = ReportFormatter::new(cli.format);

    match cli.command {
        Command::List => list_devices(),
        Command::Run {
            output_device,
            input_device,
            duration_s,
        } => run_devices(config, output_device, input_device, duration_s, formatter),
        Command::Simulate {
            delay_ms,
            duration_s,
            buffer_size,
            noise,
        } => simulate(&config, delay_ms, duration_s, buffer_size, noise, formatter),
    }
}

/// Load the config file and apply command line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&path);

    if let Some(window) = cli.sma_window {
        config.sma_window = window;
    }
    if let Some(rate) = cli.sample_rate {
        config.sample_rate = rate;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Writes rendered reports to stdout and keeps session statistics
struct ReportSink {
    formatter: ReportFormatter,
    stats: LatencyStats,
    out: io::Stdout,
}

impl ReportSink {
    fn new(formatter: ReportFormatter) -> Self {
        Self {
            formatter,
            stats: LatencyStats::new(),
            out: io::stdout(),
        }
    }

    fn emit(&mut self, report: &LatencyReport) -> Result<()> {
        self.stats.record(report);
        debug!(
            latency_ms = report.latency_ms(),
            avg_latency_ms = report.avg_latency_ms(),
            window = report.window,
            "latency_paired"
        );
        let mut out = self.out.lock();
        writeln!(out, "{}", self.formatter.render(report))?;
        out.flush()?;
        Ok(())
    }

    fn finish(self) {
        if self.stats.count() == 0 {
            warn!("{}", self.stats.summary());
        } else {
            info!("{}", self.stats.summary());
        }
    }
}

fn list_devices() -> Result<()> {
    let devices = AudioEngine::list_devices()?;
    if devices.is_empty() {
        println!("No audio devices found.");
        return Ok(());
    }

    println!("Found {} device(s):", devices.len());
    for (i, device) in devices.iter().enumerate() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}. {}{}", i + 1, device.name, default_marker);
        println!(
            "     Channels: {} in / {} out",
            device.input_channels, device.output_channels
        );
        if !device.sample_rates.is_empty() {
            let rates: Vec<String> = device.sample_rates.iter().map(|r| r.to_string()).collect();
            println!("     Sample rates: {}", rates.join(", "));
        }
    }
    Ok(())
}

fn run_devices(
    mut config: Config,
    output_device: Option<String>,
    input_device: Option<String>,
    duration_s: Option<f64>,
    formatter: ReportFormatter,
) -> Result<()> {
    if output_device.is_some() {
        config.output_device = output_device;
    }
    if input_device.is_some() {
        config.input_device = input_device;
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler_running = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_running.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let mut engine = AudioEngine::new(config);
    engine.start().context("Failed to start audio engine")?;
    info!("Measuring latency, press Ctrl+C to stop");

    let deadline = duration_s.map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
    let mut sink = ReportSink::new(formatter);

    if let Some(reports) = engine.reports() {
        while running.load(Ordering::SeqCst) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            match reports.recv_timeout(Duration::from_millis(100)) {
                Ok(report) => sink.emit(&report)?,
                Err(e) if e.is_timeout() => continue,
                Err(_) => break,
            }
        }
    }

    engine.stop()?;
    sink.finish();
    Ok(())
}

fn simulate(
    config: &Config,
    delay_ms: f64,
    duration_s: f64,
    buffer_size: usize,
    noise: f32,
    formatter: ReportFormatter,
) -> Result<()> {
    let delay_samples = (delay_ms.max(0.0) * config.sample_rate as f64 / 1000.0).round() as usize;
    let mut loopback = SimulatedLoopback::new(config, delay_samples, buffer_size)
        .context("Invalid simulation settings")?
        .with_noise(noise);

    info!(
        delay_ms = loopback.delay_ms(),
        delay_samples,
        duration_s,
        buffer_size,
        "Simulating loopback"
    );

    let mut sink = ReportSink::new(formatter);
    for report in loopback.run(loopback.buffers_for(duration_s.max(0.0))) {
        sink.emit(&report)?;
    }
    sink.finish();
    Ok(())
}
