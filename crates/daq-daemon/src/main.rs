//! Acquisition daemon entry point.
//!
//! Wires the tick source, recording toggle, and acquisition loop onto a
//! simulated board: serial output goes to stdout, SIGUSR1 plays the user
//! button, SIGTERM/SIGINT shut down gracefully.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use daq_common::config::DaqConfig;
use daq_common::state::AcquisitionState;
use daq_hal::{Board, InputLine, SimulatedBoard};
use daq_runtime::acquisition::{AcquisitionLoop, StepOutcome};
use daq_runtime::tick::{TickCounter, TickDriver};
use daq_runtime::toggle::RecordingToggle;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::signals::SignalHandler;

/// Acquisition daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "daq-daemon",
    about = "Radar data-acquisition daemon - button-toggled 1 Hz line sampling",
    version,
    long_about = None
)]
struct Args {
    /// Path to a runtime configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit human-readable status lines on the serial channel
    /// (overrides the config file).
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Maximum recording sessions to run (0 = infinite).
    #[arg(long, default_value = "0")]
    max_sessions: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting acquisition daemon");

    // Load configuration
    let mut config = load_config(&args)?;

    // Override with command-line arguments
    if args.verbose {
        config.verbose = true;
    }

    info!(?config.sample_period, verbose = config.verbose, "Configuration loaded");

    // Set up signal handling
    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    // Run the daemon
    run_daemon(&config, &signal_handler, args.max_sessions)
}

/// Initialize logging with the specified log level.
///
/// Logs go to stderr so the serial stream on stdout stays clean.
fn init_logging(level: &str) {
    let filter = format!(
        "daq_daemon={},daq_runtime={},daq_hal={},daq_common={}",
        level, level, level, level
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `DAQ_CONFIG_PATH` environment variable
/// 3. `/etc/radar-daq/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<DaqConfig> {
    // 1. Command-line argument (highest priority)
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return DaqConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var("DAQ_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from DAQ_CONFIG_PATH");
            return DaqConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from DAQ_CONFIG_PATH={:?}", env_path)
            });
        }
        warn!(
            path = %env_path,
            "DAQ_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    // 3. System path
    let system_path = PathBuf::from("/etc/radar-daq/config.toml");
    if system_path.exists() {
        info!(?system_path, "Loading config from system path");
        return DaqConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {:?}", system_path));
    }

    // 4. Local development path
    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return DaqConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {:?}", local_path));
    }

    // 5. Built-in defaults
    info!("No config file found, using built-in defaults");
    Ok(DaqConfig::default())
}

/// Main daemon run loop.
fn run_daemon(
    config: &DaqConfig,
    signal_handler: &SignalHandler,
    max_sessions: u64,
) -> Result<()> {
    let started = Instant::now();

    // Simulated board: serial output to stdout, button via SIGUSR1
    let board = SimulatedBoard::with_writer(Box::new(std::io::stdout()));
    let stimulus = board.handle();
    stimulus.set_line(InputLine::Td, config.board.td);
    stimulus.set_line(InputLine::Pd, config.board.pd);

    let tick = Arc::new(TickCounter::new());
    let toggle = Arc::new(RecordingToggle::new());
    let mut acq = AcquisitionLoop::new(board, Arc::clone(&tick), Arc::clone(&toggle), config);

    // Peripheral setup failures are fatal: report and halt
    acq.init().context("Board initialization failed")?;

    let mut ticker =
        TickDriver::start(Arc::clone(&tick), &config.realtime).context("Failed to start tick thread")?;
    info!("Tick thread running, send SIGUSR1 to press the button");

    let mut sessions_done = 0u64;
    let mut run_error = None;

    while !signal_handler.shutdown_requested() {
        if signal_handler.take_button_request() {
            stimulus.press_button();
        }

        match acq.step() {
            Ok(StepOutcome::Stopped) => {
                let snapshot = acq.metrics().snapshot();
                info!(
                    session = acq.session_count(),
                    samples = acq.total_samples(),
                    mean_interval_ms = snapshot.mean_ns.map(|ns| ns / 1_000_000),
                    max_interval_ms = snapshot.max_ns.map(|ns| ns / 1_000_000),
                    late = snapshot.late_count,
                    "Session complete"
                );

                sessions_done += 1;
                if max_sessions > 0 && sessions_done >= max_sessions {
                    info!(sessions = sessions_done, "Maximum session count reached");
                    signal_handler.request_shutdown();
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("Acquisition step failed: {}", e);
                run_error = Some(e);
                break;
            }
        }

        match acq.state() {
            AcquisitionState::Idle => std::thread::sleep(config.idle_poll),
            AcquisitionState::Recording => std::thread::sleep(config.record_poll),
        }
    }

    // Graceful shutdown
    info!("Shutting down...");

    if let Err(e) = acq.stop() {
        warn!("Failed to close session cleanly: {}", e);
    }

    ticker.stop();

    if let Err(e) = acq.board.shutdown() {
        warn!("Board shutdown failed: {}", e);
    }

    // Final statistics
    let snapshot = acq.metrics().snapshot();
    info!(
        sessions = acq.session_count(),
        total_samples = acq.total_samples(),
        late_intervals = snapshot.late_count,
        signals = signal_handler.state().signal_count(),
        uptime_secs = started.elapsed().as_secs(),
        "Daemon shutdown complete"
    );

    match run_error {
        Some(e) => Err(e).context("Acquisition loop failed"),
        None => Ok(()),
    }
}
