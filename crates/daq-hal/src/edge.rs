//! Edge detection for digital line levels.
//!
//! The start/stop button is wired active-low: the line idles high through a
//! pull-up and a press pulls it to ground, so the event of interest is the
//! TRUE→FALSE transition. [`FallingEdge`] turns a stream of sampled levels
//! into one pulse per such transition.

/// Falling edge detector.
///
/// Detects a falling edge (TRUE to FALSE transition) on a sampled line.
/// `update` returns TRUE exactly once per transition.
///
/// # Example
///
/// ```
/// use daq_hal::edge::FallingEdge;
///
/// let mut edge = FallingEdge::with_level(true);
///
/// // Line stays high - no edge
/// assert!(!edge.update(true));
///
/// // Falling edge detected
/// assert!(edge.update(false));
///
/// // Stays low - no edge
/// assert!(!edge.update(false));
///
/// // Rising back - no falling edge
/// assert!(!edge.update(true));
///
/// // Falling edge detected again
/// assert!(edge.update(false));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FallingEdge {
    /// Previously observed level.
    prev: bool,
}

impl FallingEdge {
    /// Create a detector with the previous level low.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector primed with a known line level.
    ///
    /// Use this for lines that idle high, so the very first press is
    /// detected rather than swallowed as the initial observation.
    #[must_use]
    pub fn with_level(level: bool) -> Self {
        Self { prev: level }
    }

    /// Feed one sampled level.
    ///
    /// Returns `true` if a falling edge was detected (the level
    /// transitioned from TRUE to FALSE since the previous call).
    pub fn update(&mut self, level: bool) -> bool {
        let fell = !level && self.prev;
        self.prev = level;
        fell
    }

    /// Get the previously observed level.
    #[must_use]
    pub fn level(&self) -> bool {
        self.prev
    }
}
