//! Board abstraction for the radar data-acquisition runtime.
//!
//! This crate provides:
//! - [`Board`] trait for abstracting the peripherals the acquisition loop
//!   touches (radar input lines, indicator output, serial link, button edge
//!   interrupt)
//! - [`edge`] module with falling-edge detection for sampled line levels
//! - [`SimulatedBoard`], an in-memory board for tests and host bring-up,
//!   with a shared [`BoardHandle`] for injecting stimulus

pub mod edge;

use crate::edge::FallingEdge;
use daq_common::{DaqError, DaqResult};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Digital input lines sampled during a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLine {
    /// Target-detect output of the radar module.
    Td,
    /// Presence-detect output of the radar module.
    Pd,
}

impl std::fmt::Display for InputLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputLine::Td => write!(f, "TD"),
            InputLine::Pd => write!(f, "PD"),
        }
    }
}

/// Callback registered for the button's falling-edge interrupt.
///
/// Invoked from the board driver's interrupt context; implementations must
/// not block or re-enter the acquisition loop.
pub type EdgeCallback = Arc<dyn Fn() + Send + Sync>;

/// Board driver abstraction.
///
/// This trait defines the peripheral surface the acquisition loop depends
/// on, allowing the runtime to work with different boards (simulated,
/// real hardware behind a UART) through a common interface.
pub trait Board: Send {
    /// Initialize the board peripherals.
    ///
    /// This should configure the radar lines and button as inputs, the
    /// indicator as an output, and open the serial link. Failure here is
    /// fatal to the caller; there is no degraded mode.
    fn init(&mut self) -> DaqResult<()>;

    /// Read the current level of a radar input line.
    fn read_line(&self, line: InputLine) -> bool;

    /// Drive the recording indicator output.
    fn set_indicator(&mut self, on: bool);

    /// Write raw bytes to the serial link.
    fn write_serial(&mut self, bytes: &[u8]) -> DaqResult<()>;

    /// Register the callback fired on each falling edge of the button
    /// input. At most one callback is registered; a second registration
    /// replaces the first.
    fn register_button_callback(&mut self, callback: EdgeCallback) -> DaqResult<()>;

    /// Shut the board down gracefully.
    fn shutdown(&mut self) -> DaqResult<()>;

    /// Check if the board is operational.
    fn is_operational(&self) -> bool {
        true
    }
}

/// Button input state: level history plus the registered edge callback.
struct ButtonLine {
    /// Edge detector, primed high (the button line idles through a pull-up).
    edge: FallingEdge,
    /// Registered falling-edge callback.
    callback: Option<EdgeCallback>,
}

/// State shared between a [`SimulatedBoard`] and its [`BoardHandle`]s.
struct BoardShared {
    /// Simulated TD line level.
    td: AtomicBool,
    /// Simulated PD line level.
    pd: AtomicBool,
    /// Indicator output level.
    indicator: AtomicBool,
    /// Button line and callback slot, off the sampling hot path.
    button: Mutex<ButtonLine>,
    /// Captured serial bytes.
    serial: Mutex<Vec<u8>>,
}

impl BoardShared {
    fn new() -> Self {
        Self {
            td: AtomicBool::new(false),
            pd: AtomicBool::new(false),
            indicator: AtomicBool::new(false),
            button: Mutex::new(ButtonLine {
                edge: FallingEdge::with_level(true),
                callback: None,
            }),
            serial: Mutex::new(Vec::new()),
        }
    }

    fn button(&self) -> MutexGuard<'_, ButtonLine> {
        self.button.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn serial(&self) -> MutexGuard<'_, Vec<u8>> {
        self.serial.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Simulated board for tests and host bring-up.
///
/// Line levels, the button, and the indicator live in shared state so a
/// [`BoardHandle`] can inject stimulus from another thread while the
/// acquisition loop owns the board itself.
pub struct SimulatedBoard {
    shared: Arc<BoardShared>,
    /// Optional live sink for serial output (stdout in the daemon).
    writer: Option<Box<dyn Write + Send>>,
    /// Keep serial bytes in memory for inspection.
    capture: bool,
    initialized: bool,
}

impl std::fmt::Debug for SimulatedBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedBoard")
            .field("initialized", &self.initialized)
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBoard {
    /// Create a board that captures serial output in memory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(BoardShared::new()),
            writer: None,
            capture: true,
            initialized: false,
        }
    }

    /// Create a board that forwards serial output to the given writer
    /// instead of capturing it (the daemon uses stdout here).
    #[must_use]
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            shared: Arc::new(BoardShared::new()),
            writer: Some(writer),
            capture: false,
            initialized: false,
        }
    }

    /// Get a handle for injecting stimulus and inspecting outputs.
    #[must_use]
    pub fn handle(&self) -> BoardHandle {
        BoardHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Board for SimulatedBoard {
    fn init(&mut self) -> DaqResult<()> {
        debug!("simulated board initialized");
        self.initialized = true;
        Ok(())
    }

    fn read_line(&self, line: InputLine) -> bool {
        match line {
            InputLine::Td => self.shared.td.load(Ordering::Relaxed),
            InputLine::Pd => self.shared.pd.load(Ordering::Relaxed),
        }
    }

    fn set_indicator(&mut self, on: bool) {
        self.shared.indicator.store(on, Ordering::Relaxed);
    }

    fn write_serial(&mut self, bytes: &[u8]) -> DaqResult<()> {
        if self.capture {
            self.shared.serial().extend_from_slice(bytes);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer
                .write_all(bytes)
                .and_then(|()| writer.flush())
                .map_err(|e| DaqError::Serial(e.to_string()))?;
        }
        Ok(())
    }

    fn register_button_callback(&mut self, callback: EdgeCallback) -> DaqResult<()> {
        self.shared.button().callback = Some(callback);
        Ok(())
    }

    fn shutdown(&mut self) -> DaqResult<()> {
        self.initialized = false;
        Ok(())
    }

    fn is_operational(&self) -> bool {
        self.initialized
    }
}

/// Handle to a [`SimulatedBoard`]'s shared state.
///
/// Clones freely; all methods may be called from any thread.
#[derive(Clone)]
pub struct BoardHandle {
    shared: Arc<BoardShared>,
}

impl BoardHandle {
    /// Set the level of a radar input line.
    pub fn set_line(&self, line: InputLine, level: bool) {
        match line {
            InputLine::Td => self.shared.td.store(level, Ordering::Relaxed),
            InputLine::Pd => self.shared.pd.store(level, Ordering::Relaxed),
        }
    }

    /// Get the current indicator output level.
    #[must_use]
    pub fn indicator(&self) -> bool {
        self.shared.indicator.load(Ordering::Relaxed)
    }

    /// Drive the button line to a level, firing the registered callback
    /// on a falling edge.
    pub fn set_button_level(&self, level: bool) {
        let fired = {
            let mut button = self.shared.button();
            if button.edge.update(level) {
                button.callback.clone()
            } else {
                None
            }
        };
        // Invoke outside the lock so the callback may re-register.
        if let Some(callback) = fired {
            callback();
        }
    }

    /// Simulate a full button press: pull the line low, release it high.
    pub fn press_button(&self) {
        self.set_button_level(false);
        self.set_button_level(true);
    }

    /// Snapshot the captured serial output as trimmed, non-empty lines.
    #[must_use]
    pub fn serial_lines(&self) -> Vec<String> {
        let raw = self.shared.serial();
        String::from_utf8_lossy(&raw)
            .split("\r\n")
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect()
    }

    /// Drain the captured serial output as raw bytes.
    pub fn take_serial(&self) -> Vec<u8> {
        std::mem::take(&mut *self.shared.serial())
    }
}
