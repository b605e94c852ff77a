//! Cooperative acquisition loop.
//!
//! Implements the capture cycle of the radar logger on a single thread of
//! control:
//! 1. Wait (coarse poll) for the operator to start a session
//! 2. While recording, sample both radar lines once per period
//! 3. Emit each sample pair as a text line on the serial link
//! 4. Return to waiting when the operator stops the session
//!
//! Periods are timed against the free-running tick counter with a
//! reset-then-compare per sample, so drift never accumulates across
//! periods. The first sample of a session times from the session entry
//! reset and may land up to one poll iteration late; with the strict
//! greater-than compare the nominal 1 s period fires on the 1001st tick.
//! Waiting is always a bounded sleep between polls, never an indefinite
//! block, so the tick and button contexts stay serviced.

use crate::tick::TickCounter;
use crate::toggle::RecordingToggle;
use daq_common::config::DaqConfig;
use daq_common::error::DaqResult;
use daq_common::metrics::SampleMetrics;
use daq_common::state::{AcquisitionState, StateMachine};
use daq_hal::{Board, InputLine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Line emitted on entering and leaving a recording session.
///
/// The same marker bounds both ends of a session; consumers distinguish
/// start from end by position in the stream.
pub const SESSION_MARKER: &[u8] = b"9 \r\n";

/// Screen-clear escape sequence emitted at verbose startup.
const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[;H";

/// Number of inter-sample intervals retained for jitter statistics.
const METRICS_WINDOW: usize = 1024;

/// One pair of radar line samples.
///
/// Ephemeral: produced once per sampling tick and serialized immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplePair {
    /// TD line level at the sampling instant.
    pub td: bool,
    /// PD line level at the sampling instant.
    pub pd: bool,
}

impl SamplePair {
    /// Serial line for this pair, levels as `0`/`1` separated by a space.
    ///
    /// Allocation-free: the four possible lines are static.
    #[must_use]
    pub fn line(&self) -> &'static [u8] {
        match (self.td, self.pd) {
            (false, false) => b"0 0 \r\n",
            (false, true) => b"0 1 \r\n",
            (true, false) => b"1 0 \r\n",
            (true, true) => b"1 1 \r\n",
        }
    }
}

/// What a single cooperative pass of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Idle; the toggle is still off.
    Idle,
    /// Transitioned Idle → Recording.
    Started,
    /// Recording; the sampling period has not elapsed yet.
    Waiting,
    /// Recording; one sample pair was read and emitted.
    Sampled(SamplePair),
    /// Transitioned Recording → Idle.
    Stopped,
}

/// Cooperative state machine multiplexing wait, sample, and idle phases.
///
/// Owns the board driver and reads the shared tick counter and recording
/// toggle, which are written from their respective interrupt contexts.
pub struct AcquisitionLoop<B: Board> {
    /// Board driver; public so stimulus wiring can reach a simulated
    /// board's handle in tests and in the daemon.
    pub board: B,
    tick: Arc<TickCounter>,
    toggle: Arc<RecordingToggle>,
    state: StateMachine,
    sample_period_ms: u32,
    idle_poll: Duration,
    record_poll: Duration,
    verbose: bool,
    metrics: SampleMetrics,
    session_count: u64,
    session_samples: u64,
    total_samples: u64,
    last_sample_at: Option<Instant>,
    overflow_reported: bool,
}

impl<B: Board> AcquisitionLoop<B> {
    /// Create a loop over the given board, tick source, and toggle.
    pub fn new(
        board: B,
        tick: Arc<TickCounter>,
        toggle: Arc<RecordingToggle>,
        config: &DaqConfig,
    ) -> Self {
        // Intervals run slightly over the nominal period by construction;
        // only count those beyond 10% slack as late.
        let late_threshold = config.sample_period + config.sample_period / 10;

        Self {
            board,
            tick,
            toggle,
            state: StateMachine::new(),
            sample_period_ms: config.sample_period_ms(),
            idle_poll: config.idle_poll,
            record_poll: config.record_poll,
            verbose: config.verbose,
            metrics: SampleMetrics::new(METRICS_WINDOW, late_threshold),
            session_count: 0,
            session_samples: 0,
            total_samples: 0,
            last_sample_at: None,
            overflow_reported: false,
        }
    }

    /// Initialize the board and wire the button edge to the toggle.
    ///
    /// # Errors
    ///
    /// Any board failure here is fatal to the caller; there is no
    /// degraded mode.
    pub fn init(&mut self) -> DaqResult<()> {
        self.board.init()?;

        let toggle = Arc::clone(&self.toggle);
        self.board
            .register_button_callback(Arc::new(move || toggle.on_edge()))?;

        if self.verbose {
            self.board.write_serial(CLEAR_SCREEN)?;
            self.board.write_serial(b"board up \r\n")?;
            self.board
                .write_serial(b"press the user button to start recording \r\n")?;
        }

        info!("board initialized, acquisition idle");
        Ok(())
    }

    /// Current state of the loop.
    #[must_use]
    pub fn state(&self) -> AcquisitionState {
        self.state.state()
    }

    /// Inter-sample interval metrics.
    #[must_use]
    pub fn metrics(&self) -> &SampleMetrics {
        &self.metrics
    }

    /// Number of recording sessions started.
    #[must_use]
    pub fn session_count(&self) -> u64 {
        self.session_count
    }

    /// Total samples emitted across all sessions.
    #[must_use]
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Execute one cooperative pass.
    ///
    /// Non-blocking: callers decide how long to sleep between passes.
    /// Tests drive this directly against a manually advanced tick counter.
    ///
    /// # Errors
    ///
    /// Propagates serial transport failures from the board.
    pub fn step(&mut self) -> DaqResult<StepOutcome> {
        match self.state.state() {
            AcquisitionState::Idle => {
                if self.toggle.is_active() {
                    self.enter_recording()?;
                    Ok(StepOutcome::Started)
                } else {
                    Ok(StepOutcome::Idle)
                }
            }
            AcquisitionState::Recording => {
                if !self.toggle.is_active() {
                    self.leave_recording()?;
                    Ok(StepOutcome::Stopped)
                } else if self.tick.elapsed_ms() > self.sample_period_ms {
                    self.tick.reset();
                    let pair = self.sample()?;
                    Ok(StepOutcome::Sampled(pair))
                } else {
                    Ok(StepOutcome::Waiting)
                }
            }
        }
    }

    /// Run until the shutdown flag is raised.
    ///
    /// Sleeps `idle_poll` between passes while idle and `record_poll`
    /// while recording. On shutdown an in-flight session is closed
    /// cleanly.
    ///
    /// # Errors
    ///
    /// Propagates the first step failure.
    pub fn run(&mut self, shutdown: &AtomicBool) -> DaqResult<()> {
        info!("entering acquisition loop");

        while !shutdown.load(Ordering::Relaxed) {
            self.step()?;
            match self.state.state() {
                AcquisitionState::Idle => thread::sleep(self.idle_poll),
                AcquisitionState::Recording => thread::sleep(self.record_poll),
            }
        }

        info!(
            sessions = self.session_count,
            samples = self.total_samples,
            "acquisition loop exited"
        );
        self.stop()
    }

    /// Close an in-flight recording session, if any.
    ///
    /// # Errors
    ///
    /// Propagates serial transport failures from the session close.
    pub fn stop(&mut self) -> DaqResult<()> {
        if self.state.state().is_recording() {
            self.leave_recording()?;
        }
        Ok(())
    }

    fn enter_recording(&mut self) -> DaqResult<()> {
        self.state.transition(AcquisitionState::Recording)?;

        self.board.set_indicator(true);
        if self.verbose {
            self.board.write_serial(b"START \r\n")?;
        }
        self.board.write_serial(SESSION_MARKER)?;
        self.tick.reset();

        self.session_count += 1;
        self.session_samples = 0;
        self.overflow_reported = false;
        self.last_sample_at = Some(Instant::now());

        info!(session = self.session_count, "recording started");
        Ok(())
    }

    fn leave_recording(&mut self) -> DaqResult<()> {
        self.state.transition(AcquisitionState::Idle)?;

        self.board.set_indicator(false);
        self.board.write_serial(SESSION_MARKER)?;
        if self.verbose {
            self.board.write_serial(b"END \r\n")?;
        }
        self.last_sample_at = None;

        info!(
            session = self.session_count,
            samples = self.session_samples,
            "recording stopped"
        );
        Ok(())
    }

    fn sample(&mut self) -> DaqResult<SamplePair> {
        let pair = SamplePair {
            td: self.board.read_line(InputLine::Td),
            pd: self.board.read_line(InputLine::Pd),
        };
        self.board.write_serial(pair.line())?;

        if self.tick.overflowed() && !self.overflow_reported {
            warn!("tick counter wrapped; one sampling period may be inaccurate");
            self.overflow_reported = true;
        }

        let now = Instant::now();
        if let Some(prev) = self.last_sample_at.replace(now) {
            self.metrics.record(now - prev);
        }
        self.session_samples += 1;
        self.total_samples += 1;

        debug!(td = pair.td, pd = pair.pd, n = self.session_samples, "sample emitted");
        Ok(pair)
    }
}

/// Builder for configuring an acquisition loop.
pub struct AcquisitionBuilder<B: Board> {
    board: B,
    tick: Arc<TickCounter>,
    toggle: Arc<RecordingToggle>,
    config: DaqConfig,
}

impl<B: Board> AcquisitionBuilder<B> {
    /// Create a builder with default configuration.
    pub fn new(board: B, tick: Arc<TickCounter>, toggle: Arc<RecordingToggle>) -> Self {
        Self {
            board,
            tick,
            toggle,
            config: DaqConfig::default(),
        }
    }

    /// Set the sampling period.
    #[must_use]
    pub fn sample_period(mut self, period: Duration) -> Self {
        self.config.sample_period = period;
        self
    }

    /// Set the idle poll interval.
    #[must_use]
    pub fn idle_poll(mut self, interval: Duration) -> Self {
        self.config.idle_poll = interval;
        self
    }

    /// Set the recording poll interval.
    #[must_use]
    pub fn record_poll(mut self, interval: Duration) -> Self {
        self.config.record_poll = interval;
        self
    }

    /// Enable verbose status lines on the serial channel.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Set the full configuration.
    #[must_use]
    pub fn config(mut self, config: DaqConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the acquisition loop.
    pub fn build(self) -> AcquisitionLoop<B> {
        AcquisitionLoop::new(self.board, self.tick, self.toggle, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daq_hal::{BoardHandle, SimulatedBoard};

    fn make_loop(
        verbose: bool,
    ) -> (
        AcquisitionLoop<SimulatedBoard>,
        BoardHandle,
        Arc<TickCounter>,
        Arc<RecordingToggle>,
    ) {
        let tick = Arc::new(TickCounter::new());
        let toggle = Arc::new(RecordingToggle::new());
        let board = SimulatedBoard::new();
        let handle = board.handle();

        let mut acq = AcquisitionBuilder::new(board, Arc::clone(&tick), Arc::clone(&toggle))
            .verbose(verbose)
            .build();
        acq.init().unwrap();

        (acq, handle, tick, toggle)
    }

    /// Advance the tick source and run one pass per tick, collecting
    /// emitted samples.
    fn drive_ticks(
        acq: &mut AcquisitionLoop<SimulatedBoard>,
        tick: &TickCounter,
        n: u32,
    ) -> Vec<SamplePair> {
        let mut sampled = Vec::new();
        for _ in 0..n {
            tick.advance();
            if let StepOutcome::Sampled(pair) = acq.step().unwrap() {
                sampled.push(pair);
            }
        }
        sampled
    }

    #[test]
    fn test_idle_emits_nothing() {
        let (mut acq, handle, tick, _toggle) = make_loop(false);

        for _ in 0..100 {
            tick.advance();
            assert_eq!(acq.step().unwrap(), StepOutcome::Idle);
        }

        assert!(handle.serial_lines().is_empty());
        assert!(!handle.indicator());
        assert_eq!(acq.state(), AcquisitionState::Idle);
    }

    #[test]
    fn test_button_starts_and_stops_session() {
        let (mut acq, handle, _tick, _toggle) = make_loop(false);

        handle.press_button();
        assert_eq!(acq.step().unwrap(), StepOutcome::Started);
        assert_eq!(acq.state(), AcquisitionState::Recording);
        assert!(handle.indicator());
        assert_eq!(handle.serial_lines(), vec!["9"]);

        handle.press_button();
        assert_eq!(acq.step().unwrap(), StepOutcome::Stopped);
        assert_eq!(acq.state(), AcquisitionState::Idle);
        assert!(!handle.indicator());
        assert_eq!(handle.serial_lines(), vec!["9", "9"]);
        assert_eq!(acq.session_count(), 1);
    }

    #[test]
    fn test_double_press_within_one_poll_is_a_no_op() {
        let (mut acq, handle, _tick, _toggle) = make_loop(false);

        // Both edges land before the loop polls the toggle again
        handle.press_button();
        handle.press_button();

        assert_eq!(acq.step().unwrap(), StepOutcome::Idle);
        assert!(handle.serial_lines().is_empty());
        assert_eq!(acq.session_count(), 0);
    }

    #[test]
    fn test_strict_period_compare() {
        let (mut acq, handle, tick, _toggle) = make_loop(false);

        handle.press_button();
        acq.step().unwrap();

        // Exactly 1000 ticks: not yet
        for _ in 0..1000 {
            tick.advance();
        }
        assert_eq!(acq.step().unwrap(), StepOutcome::Waiting);

        // The 1001st tick fires the sample
        tick.advance();
        assert!(matches!(acq.step().unwrap(), StepOutcome::Sampled(_)));
        assert_eq!(tick.elapsed_ms(), 0);
    }

    #[test]
    fn test_one_sample_per_period() {
        let (mut acq, handle, tick, _toggle) = make_loop(false);

        handle.press_button();
        acq.step().unwrap();

        let sampled = drive_ticks(&mut acq, &tick, 5005);
        assert_eq!(sampled.len(), 5);
        assert_eq!(acq.total_samples(), 5);

        // Marker plus five sample lines
        assert_eq!(handle.serial_lines().len(), 6);
    }

    #[test]
    fn test_sample_values_match_pins() {
        let (mut acq, handle, tick, _toggle) = make_loop(false);

        handle.set_line(InputLine::Td, true);
        handle.press_button();
        acq.step().unwrap();

        let sampled = drive_ticks(&mut acq, &tick, 1001);
        assert_eq!(sampled, vec![SamplePair { td: true, pd: false }]);

        handle.set_line(InputLine::Pd, true);
        let sampled = drive_ticks(&mut acq, &tick, 1001);
        assert_eq!(sampled, vec![SamplePair { td: true, pd: true }]);

        assert_eq!(handle.serial_lines(), vec!["9", "1 0", "1 1"]);
    }

    #[test]
    fn test_end_to_end_session() {
        let (mut acq, handle, tick, _toggle) = make_loop(false);

        // Start recording with TD high
        handle.set_line(InputLine::Td, true);
        handle.press_button();
        assert_eq!(acq.step().unwrap(), StepOutcome::Started);

        // First period
        let sampled = drive_ticks(&mut acq, &tick, 1001);
        assert_eq!(sampled.len(), 1);

        // PD rises before the second period
        handle.set_line(InputLine::Pd, true);
        let sampled = drive_ticks(&mut acq, &tick, 1001);
        assert_eq!(sampled.len(), 1);

        // Stop; further ticks produce nothing
        handle.press_button();
        assert_eq!(acq.step().unwrap(), StepOutcome::Stopped);
        let sampled = drive_ticks(&mut acq, &tick, 3000);
        assert!(sampled.is_empty());

        assert_eq!(handle.serial_lines(), vec!["9", "1 0", "1 1", "9"]);
    }

    #[test]
    fn test_marker_only_at_transitions() {
        let (mut acq, handle, tick, _toggle) = make_loop(false);

        handle.press_button();
        acq.step().unwrap();
        drive_ticks(&mut acq, &tick, 2500);
        handle.press_button();
        acq.step().unwrap();

        let markers = handle
            .serial_lines()
            .iter()
            .filter(|line| *line == "9")
            .count();
        assert_eq!(markers, 2);
    }

    #[test]
    fn test_stop_closes_open_session() {
        let (mut acq, handle, _tick, _toggle) = make_loop(false);

        handle.press_button();
        acq.step().unwrap();
        assert!(handle.indicator());

        acq.stop().unwrap();
        assert_eq!(acq.state(), AcquisitionState::Idle);
        assert!(!handle.indicator());
        assert_eq!(handle.serial_lines(), vec!["9", "9"]);

        // Idempotent when already idle
        acq.stop().unwrap();
        assert_eq!(handle.serial_lines().len(), 2);
    }

    #[test]
    fn test_verbose_status_lines() {
        let (mut acq, handle, tick, _toggle) = make_loop(true);

        handle.press_button();
        acq.step().unwrap();
        drive_ticks(&mut acq, &tick, 1001);
        handle.press_button();
        acq.step().unwrap();

        let lines = handle.serial_lines();
        assert!(lines.iter().any(|l| l.ends_with("board up")));
        assert!(lines.contains(&"press the user button to start recording".to_string()));
        assert!(lines.contains(&"START".to_string()));
        assert!(lines.contains(&"END".to_string()));

        // Markers and samples are still present in verbose mode
        assert_eq!(lines.iter().filter(|l| *l == "9").count(), 2);
        assert_eq!(lines.iter().filter(|l| *l == "0 0").count(), 1);
    }

    #[test]
    fn test_second_session_resets_period_timing() {
        let (mut acq, handle, tick, _toggle) = make_loop(false);

        // Let the tick counter run up while idle
        for _ in 0..700 {
            tick.advance();
        }

        handle.press_button();
        acq.step().unwrap();

        // Entry reset discards the idle ticks: 1000 more are not enough
        for _ in 0..1000 {
            tick.advance();
        }
        assert_eq!(acq.step().unwrap(), StepOutcome::Waiting);
        tick.advance();
        assert!(matches!(acq.step().unwrap(), StepOutcome::Sampled(_)));
    }

    #[test]
    fn test_sample_line_bytes() {
        assert_eq!(SamplePair { td: false, pd: false }.line(), b"0 0 \r\n");
        assert_eq!(SamplePair { td: true, pd: false }.line(), b"1 0 \r\n");
        assert_eq!(SamplePair { td: false, pd: true }.line(), b"0 1 \r\n");
        assert_eq!(SamplePair { td: true, pd: true }.line(), b"1 1 \r\n");
    }

    #[test]
    fn test_builder_overrides() {
        let tick = Arc::new(TickCounter::new());
        let toggle = Arc::new(RecordingToggle::new());
        let acq = AcquisitionBuilder::new(SimulatedBoard::new(), tick, toggle)
            .sample_period(Duration::from_millis(50))
            .idle_poll(Duration::from_millis(2))
            .record_poll(Duration::from_micros(500))
            .build();

        assert_eq!(acq.sample_period_ms, 50);
        assert_eq!(acq.idle_poll, Duration::from_millis(2));
        assert_eq!(acq.record_poll, Duration::from_micros(500));
    }
}
