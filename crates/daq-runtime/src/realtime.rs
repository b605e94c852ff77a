//! Real-time scheduling and memory locking for the tick thread.
//!
//! The tick thread stands in for a hardware timer interrupt, so its
//! wakeup latency bounds the tick fidelity. On capable systems it can be
//! given a real-time scheduler slot and locked memory pages:
//! - Memory locking (mlockall) to prevent page faults
//! - Real-time scheduling (SCHED_FIFO/SCHED_RR) for priority execution
//!
//! Both are opt-in and degrade with a warning when privileges are missing.

use daq_common::config::{RealtimeConfig, SchedPolicy};
use daq_common::error::{DaqError, DaqResult};
use tracing::{debug, info, warn};

/// Result of real-time initialization.
#[derive(Debug, Clone)]
pub struct RealtimeStatus {
    /// Whether memory was locked successfully.
    pub memory_locked: bool,
    /// Applied scheduler policy.
    pub scheduler_policy: Option<SchedPolicy>,
    /// Applied scheduler priority.
    pub scheduler_priority: Option<u8>,
}

/// Initialize the real-time environment for the calling thread.
///
/// # Errors
///
/// Returns an error if a requested RT feature fails for a reason other
/// than missing privileges. Missing privileges are logged and skipped.
///
/// # Platform Support
///
/// Full support on Linux. No-op with a warning elsewhere.
pub fn init_realtime(config: &RealtimeConfig) -> DaqResult<RealtimeStatus> {
    if !config.enabled {
        debug!("real-time scheduling disabled in configuration");
        return Ok(RealtimeStatus {
            memory_locked: false,
            scheduler_policy: None,
            scheduler_priority: None,
        });
    }

    info!("initializing real-time environment");

    let memory_locked = if config.lock_memory {
        lock_memory()?
    } else {
        false
    };

    let (scheduler_policy, scheduler_priority) = set_scheduler(config.policy, config.priority)?;

    let status = RealtimeStatus {
        memory_locked,
        scheduler_policy,
        scheduler_priority,
    };

    info!(?status, "real-time initialization complete");
    Ok(status)
}

/// Lock all current and future memory pages.
#[cfg(target_os = "linux")]
fn lock_memory() -> DaqResult<bool> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    debug!("locking memory pages with mlockall");

    match mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        Ok(()) => {
            info!("memory locked successfully");
            Ok(true)
        }
        Err(e) => {
            // EPERM is common when not running as root or without CAP_IPC_LOCK
            if e == nix::errno::Errno::EPERM {
                warn!(
                    "mlockall failed with EPERM - running without CAP_IPC_LOCK capability. \
                     Page faults may occur during execution."
                );
                Ok(false)
            } else {
                Err(DaqError::Config(format!("mlockall failed: {e}")))
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn lock_memory() -> DaqResult<bool> {
    warn!("mlockall not available on this platform");
    Ok(false)
}

/// Set real-time scheduler policy and priority for the calling thread.
#[cfg(target_os = "linux")]
fn set_scheduler(
    policy: SchedPolicy,
    priority: u8,
) -> DaqResult<(Option<SchedPolicy>, Option<u8>)> {
    let linux_policy = match policy {
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::Rr => libc::SCHED_RR,
        SchedPolicy::Other => {
            debug!("using SCHED_OTHER (non-RT) scheduling");
            return Ok((Some(SchedPolicy::Other), None));
        }
    };

    // Clamp priority to valid range (1-99 for RT policies)
    let clamped_priority = priority.clamp(1, 99);
    if clamped_priority != priority {
        warn!(
            original = priority,
            clamped = clamped_priority,
            "scheduler priority clamped to valid range"
        );
    }

    debug!(?policy, priority = clamped_priority, "setting real-time scheduler");

    // SAFETY: sched_setscheduler is safe when called with valid parameters
    let param = libc::sched_param {
        sched_priority: i32::from(clamped_priority),
    };

    let result = unsafe { libc::sched_setscheduler(0, linux_policy, &param) };

    if result == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            warn!(
                "sched_setscheduler failed with EPERM - running without RT privileges. \
                 Consider running with CAP_SYS_NICE capability or as root."
            );
            return Ok((None, None));
        }
        return Err(DaqError::Config(format!("sched_setscheduler failed: {err}")));
    }

    info!(?policy, priority = clamped_priority, "real-time scheduler configured");
    Ok((Some(policy), Some(clamped_priority)))
}

#[cfg(not(target_os = "linux"))]
fn set_scheduler(
    policy: SchedPolicy,
    priority: u8,
) -> DaqResult<(Option<SchedPolicy>, Option<u8>)> {
    warn!(?policy, priority, "real-time scheduling not available on this platform");
    Ok((None, None))
}
