//! Acquisition state machine.
//!
//! The acquisition loop has exactly two states:
//! IDLE ⇄ RECORDING
//!
//! Idle waits for the operator to press the start button; Recording
//! samples the radar lines once per period until the button is pressed
//! again. There is no terminal state.

use crate::error::{DaqError, DaqResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcquisitionState {
    /// Waiting for the operator to start a recording session.
    #[default]
    Idle,
    /// Sampling the radar lines once per period.
    Recording,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Recording => write!(f, "RECORDING"),
        }
    }
}

impl AcquisitionState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: AcquisitionState) -> bool {
        use AcquisitionState::{Idle, Recording};

        matches!((self, target), (Idle, Recording) | (Recording, Idle))
    }

    /// Attempt to transition to `target`, returning error if invalid.
    pub fn transition_to(&mut self, target: AcquisitionState) -> DaqResult<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(DaqError::InvalidStateTransition {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Returns true if a recording session is in progress.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: AcquisitionState,
    previous: Option<AcquisitionState>,
    transition_count: u64,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine starting in IDLE.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: AcquisitionState::Idle,
            previous: None,
            transition_count: 0,
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> AcquisitionState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<AcquisitionState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    pub fn transition(&mut self, target: AcquisitionState) -> DaqResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(DaqError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }
}
