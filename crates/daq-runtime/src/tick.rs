//! Free-running millisecond tick source.
//!
//! [`TickCounter`] is the process-wide millisecond clock the acquisition
//! loop times its sampling periods against. On hardware it would be fed by
//! a 1 kHz timer interrupt; here a dedicated [`TickDriver`] thread plays
//! that role.
//!
//! Writer discipline, per field:
//! - `count` is incremented only by the tick context (`advance`) and reset
//!   only by the acquisition loop between sampling windows; the two writers
//!   never race with conflicting intent.
//! - `overflowed` is set only by the tick context and never cleared.
//!
//! Each field is an independent single-word atomic; no cross-field ordering
//! is required, so relaxed ordering is used throughout.

use crate::realtime;
use daq_common::config::RealtimeConfig;
use daq_common::error::{DaqError, DaqResult};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between tick firings.
pub const TICK_PERIOD: Duration = Duration::from_millis(1);

/// Monotonically increasing millisecond counter with sticky overflow flag.
#[derive(Debug)]
pub struct TickCounter {
    /// Milliseconds since the last reset.
    count: AtomicU32,
    /// Set on wraparound, never cleared.
    overflowed: AtomicBool,
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TickCounter {
    /// Create a counter at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            overflowed: AtomicBool::new(false),
        }
    }

    /// Advance the counter by one millisecond.
    ///
    /// Called once per tick period from the tick context. Safe from
    /// interrupt context: a single atomic increment, no blocking, no
    /// logging. On wraparound to 0 the sticky overflow flag is raised.
    pub fn advance(&self) {
        let prev = self.count.fetch_add(1, Ordering::Relaxed);
        if prev == u32::MAX {
            self.overflowed.store(true, Ordering::Relaxed);
        }
    }

    /// Milliseconds since the last reset.
    #[must_use]
    pub fn elapsed_ms(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Reset the counter to zero.
    ///
    /// Does not clear the overflow flag. Called only by the acquisition
    /// loop between sampling windows.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    /// Whether the counter has ever wrapped around.
    ///
    /// A wraparound between resets makes exactly one sampling period
    /// inaccurate; the flag records that it happened without interrupting
    /// operation.
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Relaxed)
    }
}

/// Thread emulating the periodic 1 kHz timer interrupt.
///
/// Fires [`TickCounter::advance`] against absolute deadlines, so sleep
/// jitter does not accumulate: after an oversleep the loop fires once per
/// elapsed period until caught up.
#[derive(Debug)]
pub struct TickDriver {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl TickDriver {
    /// Spawn the tick thread.
    ///
    /// The thread applies the real-time configuration to itself before
    /// entering the tick loop; a failed real-time setup degrades with a
    /// warning rather than aborting.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn start(counter: Arc<TickCounter>, config: &RealtimeConfig) -> DaqResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let rt_config = config.clone();

        let handle = thread::Builder::new()
            .name("daq-tick".into())
            .spawn(move || {
                match realtime::init_realtime(&rt_config) {
                    Ok(status) => debug!(?status, "tick thread started"),
                    Err(e) => warn!("real-time setup for tick thread failed: {e}"),
                }

                let mut next = Instant::now() + TICK_PERIOD;
                while !stop_flag.load(Ordering::Relaxed) {
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    }
                    counter.advance();
                    next += TICK_PERIOD;
                }

                debug!("tick thread stopped");
            })
            .map_err(|e| DaqError::Config(format!("failed to spawn tick thread: {e}")))?;

        Ok(Self {
            handle: Some(handle),
            stop,
        })
    }

    /// Stop the tick thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("tick thread panicked");
            }
        }
    }

    /// Check if the tick thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_counts_advances_since_reset() {
        let tick = TickCounter::new();
        assert_eq!(tick.elapsed_ms(), 0);

        for _ in 0..250 {
            tick.advance();
        }
        assert_eq!(tick.elapsed_ms(), 250);

        tick.reset();
        assert_eq!(tick.elapsed_ms(), 0);

        tick.advance();
        tick.advance();
        assert_eq!(tick.elapsed_ms(), 2);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let tick = TickCounter::new();
        for _ in 0..10 {
            tick.advance();
        }

        tick.reset();
        assert_eq!(tick.elapsed_ms(), 0);
        tick.reset();
        assert_eq!(tick.elapsed_ms(), 0);
        assert!(!tick.overflowed());
    }

    #[test]
    fn test_overflow_is_sticky() {
        let tick = TickCounter::new();
        tick.count.store(u32::MAX, Ordering::Relaxed);
        assert!(!tick.overflowed());

        // Wraparound raises the flag
        tick.advance();
        assert_eq!(tick.elapsed_ms(), 0);
        assert!(tick.overflowed());

        // Further advances keep it raised
        tick.advance();
        assert!(tick.overflowed());
        assert_eq!(tick.elapsed_ms(), 1);

        // Reset does not clear it
        tick.reset();
        assert!(tick.overflowed());
    }

    #[test]
    fn test_driver_advances_counter() {
        let tick = Arc::new(TickCounter::new());
        let mut driver = TickDriver::start(Arc::clone(&tick), &RealtimeConfig::default()).unwrap();
        assert!(driver.is_running());

        thread::sleep(Duration::from_millis(80));
        driver.stop();
        assert!(!driver.is_running());

        let elapsed = tick.elapsed_ms();
        // Generous bounds: scheduling jitter, but the deadline loop catches up
        assert!(elapsed >= 40, "expected >= 40 ticks, got {elapsed}");
        assert!(elapsed <= 200, "expected <= 200 ticks, got {elapsed}");

        // No more ticks after stop
        let frozen = tick.elapsed_ms();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(tick.elapsed_ms(), frozen);
    }
}
