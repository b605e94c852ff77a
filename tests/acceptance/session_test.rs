//! Session lifecycle acceptance tests.
//!
//! A recording session is driven end to end against a live tick thread:
//! button press starts it, samples flow at the configured period, a second
//! press (or daemon shutdown) ends it with the closing marker line.

use daq_common::config::RealtimeConfig;
use daq_hal::{BoardHandle, InputLine, SimulatedBoard};
use daq_runtime::acquisition::{AcquisitionBuilder, AcquisitionLoop};
use daq_runtime::tick::{TickCounter, TickDriver};
use daq_runtime::toggle::RecordingToggle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A running acquisition stack: tick thread, loop thread, stimulus handle.
struct Harness {
    handle: BoardHandle,
    stop: Arc<AtomicBool>,
    ticker: TickDriver,
    worker: JoinHandle<AcquisitionLoop<SimulatedBoard>>,
}

impl Harness {
    /// Start the full stack with a shortened sampling period so the tests
    /// stay fast.
    fn start(sample_period: Duration) -> Self {
        let tick = Arc::new(TickCounter::new());
        let toggle = Arc::new(RecordingToggle::new());
        let board = SimulatedBoard::new();
        let handle = board.handle();

        let mut acq = AcquisitionBuilder::new(board, Arc::clone(&tick), toggle)
            .sample_period(sample_period)
            .idle_poll(Duration::from_millis(2))
            .record_poll(Duration::from_millis(1))
            .build();
        acq.init().expect("board init");

        let ticker = TickDriver::start(tick, &RealtimeConfig::default()).expect("tick thread");

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let worker = thread::spawn(move || {
            acq.run(&stop_flag).expect("acquisition loop");
            acq
        });

        Self {
            handle,
            stop,
            ticker,
            worker,
        }
    }

    /// Stop the loop and tick threads and hand back the loop for
    /// inspection.
    fn shutdown(mut self) -> AcquisitionLoop<SimulatedBoard> {
        self.stop.store(true, Ordering::Relaxed);
        let acq = self.worker.join().expect("loop thread join");
        self.ticker.stop();
        acq
    }
}

#[test]
fn idle_stack_emits_nothing() {
    let harness = Harness::start(Duration::from_millis(100));

    thread::sleep(Duration::from_millis(250));

    let handle = harness.handle.clone();
    let acq = harness.shutdown();

    assert!(handle.serial_lines().is_empty());
    assert_eq!(acq.session_count(), 0);
    assert_eq!(acq.total_samples(), 0);
}

#[test]
fn button_toggled_session_produces_markers_and_samples() {
    let harness = Harness::start(Duration::from_millis(200));
    let handle = harness.handle.clone();

    handle.set_line(InputLine::Td, true);
    handle.press_button();

    // Roughly five sampling periods
    thread::sleep(Duration::from_millis(1050));

    handle.press_button();
    // Let the loop observe the toggle and close the session
    thread::sleep(Duration::from_millis(50));

    let lines = handle.serial_lines();
    assert!(lines.len() >= 4, "expected a full session, got {lines:?}");
    assert_eq!(lines.first().map(String::as_str), Some("9"));
    assert_eq!(lines.last().map(String::as_str), Some("9"));

    let samples: Vec<&String> = lines.iter().filter(|l| *l != "9").collect();
    assert!(
        (2..=8).contains(&samples.len()),
        "expected 2..=8 samples in ~1s at 200ms, got {}",
        samples.len()
    );
    assert!(samples.iter().all(|l| l.as_str() == "1 0"), "lines: {lines:?}");

    // No further output once the session is over
    let settled = handle.serial_lines().len();
    thread::sleep(Duration::from_millis(500));
    assert_eq!(handle.serial_lines().len(), settled);

    let acq = harness.shutdown();
    assert_eq!(acq.session_count(), 1);
    assert!(acq.metrics().snapshot().total_samples >= 1);
}

#[test]
fn shutdown_mid_session_closes_cleanly() {
    let harness = Harness::start(Duration::from_millis(100));
    let handle = harness.handle.clone();

    handle.press_button();
    thread::sleep(Duration::from_millis(350));

    // Shut down while still recording; the loop must emit the closing
    // marker and drop the indicator on its way out
    let acq = harness.shutdown();

    let lines = handle.serial_lines();
    assert_eq!(lines.first().map(String::as_str), Some("9"));
    assert_eq!(lines.last().map(String::as_str), Some("9"));
    assert!(lines.len() >= 3, "expected at least one sample, got {lines:?}");
    assert!(!handle.indicator());
    assert_eq!(acq.session_count(), 1);
}

#[test]
fn sessions_are_repeatable() {
    let harness = Harness::start(Duration::from_millis(100));
    let handle = harness.handle.clone();

    for _ in 0..3 {
        handle.press_button();
        thread::sleep(Duration::from_millis(250));
        handle.press_button();
        thread::sleep(Duration::from_millis(50));
    }

    let acq = harness.shutdown();
    assert_eq!(acq.session_count(), 3);

    let lines = handle.serial_lines();
    let markers = lines.iter().filter(|l| *l == "9").count();
    assert_eq!(markers, 6, "two markers per session, got {lines:?}");
}
