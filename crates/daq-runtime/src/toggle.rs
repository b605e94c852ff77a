//! Recording toggle driven by the button edge interrupt.
//!
//! The sole piece of shared mutable state crossing the interrupt/main
//! boundary: the edge callback flips it, the acquisition loop reads it.
//! A single-word atomic makes the concurrent flip-while-read safe by
//! construction. Relaxed ordering is sufficient; there is no other state
//! the flag must be ordered against.

use std::sync::atomic::{AtomicBool, Ordering};

/// User start/stop intent, flipped by the button's falling-edge callback.
///
/// No debounce or glitch filtering is performed here: if the underlying
/// edge detection delivers spurious repeated triggers, the toggle flips
/// spuriously. Contact bounce is a board-layer concern; filtering it here
/// would change observable behavior.
#[derive(Debug)]
pub struct RecordingToggle {
    active: AtomicBool,
}

impl Default for RecordingToggle {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingToggle {
    /// Create a toggle in the inactive state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    /// Flip the toggle. Called once per falling edge on the button input.
    ///
    /// Safe from interrupt context: a single atomic XOR, no blocking.
    pub fn on_edge(&self) {
        self.active.fetch_xor(true, Ordering::Relaxed);
    }

    /// Current recording intent.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}
