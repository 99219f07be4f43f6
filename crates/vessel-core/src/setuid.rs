//! Detection of elevated privileges.
//!
//! Helper executables are located through the environment, so they must
//! never be launched from a setuid or setgid process.

use std::sync::OnceLock;

use nix::unistd::{getegid, geteuid, getgid, getuid};

use vessel_common::error::{Result, VesselError};

static IS_SETUID: OnceLock<bool> = OnceLock::new();

/// Returns whether the real and effective user or group IDs differ.
///
/// Computed once per process.
#[must_use]
pub fn is_setuid() -> bool {
    *IS_SETUID.get_or_init(|| {
        let elevated = getuid() != geteuid() || getgid() != getegid();
        if elevated {
            tracing::warn!("running with elevated privileges");
        }
        elevated
    })
}

/// Fails if the process is setuid or setgid.
///
/// # Errors
///
/// Returns [`VesselError::Config`] naming `what` when [`is_setuid`] is true.
pub fn check_not_setuid(what: &str) -> Result<()> {
    if is_setuid() {
        return Err(VesselError::Config {
            message: format!("Cannot run {what} when setuid or setgid"),
        });
    }
    Ok(())
}
