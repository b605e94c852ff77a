//! Integration tests for acquisition acceptance testing.
//!
//! These tests verify wall-clock behavior of the assembled runtime:
//! - Session lifecycle driven by button presses
//! - Sampling cadence against a live tick thread
//! - Clean shutdown mid-session
//!
//! Timing assertions use generous tolerances; the tests must pass on
//! loaded CI machines, not just idle workstations.

mod session_test;
