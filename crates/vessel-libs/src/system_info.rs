//! How the host's dynamic linker expands its string tokens.

use vessel_common::config::VesselConfig;
use vessel_common::constants::{HELPER_DETECT_LIB, HELPER_DETECT_PLATFORM, MOCK_PLATFORM};
use vessel_common::error::{FsErrorKind, Result, VesselError};
use vessel_common::types::Architecture;
use vessel_core::subprocess::SubprocessRunner;

/// Source of dynamic linker token expansions, per architecture.
pub trait SystemInfo {
    /// What `${LIB}` expands to for `arch`, such as `lib/x86_64-linux-gnu`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expansion cannot be determined.
    fn libdl_lib(&self, arch: &Architecture) -> Result<String>;

    /// What `${PLATFORM}` expands to for `arch`, such as `haswell`.
    ///
    /// # Errors
    ///
    /// Returns an error if the expansion cannot be determined.
    fn libdl_platform(&self, arch: &Architecture) -> Result<String>;
}

/// Asks the real dynamic linker, through the `detect-lib` and
/// `detect-platform` helpers built for each architecture.
#[derive(Debug, Clone)]
pub struct HelperSystemInfo {
    runner: SubprocessRunner,
}

impl HelperSystemInfo {
    /// Creates a probe that launches helpers with `runner`.
    #[must_use]
    pub const fn new(runner: SubprocessRunner) -> Self {
        Self { runner }
    }
}

impl SystemInfo for HelperSystemInfo {
    fn libdl_lib(&self, arch: &Architecture) -> Result<String> {
        self.runner.run_helper(arch.tuple, HELPER_DETECT_LIB, &[])
    }

    fn libdl_platform(&self, arch: &Architecture) -> Result<String> {
        self.runner.run_helper(arch.tuple, HELPER_DETECT_PLATFORM, &[])
    }
}

/// Predictable answers for test environments: `${LIB}` is never usable,
/// so layouts always fall back to `${PLATFORM}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardizedSystemInfo;

impl SystemInfo for StandardizedSystemInfo {
    fn libdl_lib(&self, _arch: &Architecture) -> Result<String> {
        Err(VesselError::io(
            FsErrorKind::NotSupported,
            "Pretending multilib is unsupported for unit test",
        ))
    }

    fn libdl_platform(&self, arch: &Architecture) -> Result<String> {
        if cfg!(any(target_arch = "x86_64", target_arch = "x86")) {
            if let Some(first) = arch.platforms.first() {
                return Ok((*first).to_owned());
            }
        }
        Ok(MOCK_PLATFORM.to_owned())
    }
}

/// Chooses the system-info source for `config`.
#[must_use]
pub fn from_config(config: &VesselConfig) -> Box<dyn SystemInfo> {
    if config.standardize_platform {
        tracing::debug!("using standardized platform answers");
        Box::new(StandardizedSystemInfo)
    } else {
        Box::new(HelperSystemInfo::new(SubprocessRunner::from_env(config)))
    }
}
