//! Runtime configuration for the vessel tools.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HELPERS_PATH, ENV_HELPERS_PATH, ENV_TEST_STANDARDIZE_PLATFORM};

/// Root configuration shared by the library layout and helper runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselConfig {
    /// Directory in which temporary trees are created.
    pub temp_dir: PathBuf,
    /// Directory containing the `<tuple>-<helper>` executables.
    pub helpers_path: PathBuf,
    /// Replace dynamic linker probing with predictable mock answers.
    pub standardize_platform: bool,
}

impl Default for VesselConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            helpers_path: PathBuf::from(DEFAULT_HELPERS_PATH),
            standardize_platform: false,
        }
    }
}

impl VesselConfig {
    /// Builds the configuration from the process environment.
    ///
    /// `TMPDIR` is honoured through [`std::env::temp_dir`]; empty values of
    /// `SRT_HELPERS_PATH` are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(helpers) = std::env::var_os(ENV_HELPERS_PATH).filter(|v| !v.is_empty()) {
            config.helpers_path = PathBuf::from(helpers);
        }

        config.standardize_platform = std::env::var_os(ENV_TEST_STANDARDIZE_PLATFORM).is_some();
        config
    }
}
