//! Library directory naming schemes.

use std::fmt;

use serde::Serialize;

use vessel_common::constants::{LIB_TOKEN, PLATFORM_TOKEN};
use vessel_common::types::Architecture;

use crate::SystemInfo;

/// How the dynamic linker's string tokens map to per-architecture
/// directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibScheme {
    /// Debian-style multiarch: `${LIB}` is `lib/x86_64-linux-gnu`.
    Multiarch,
    /// The early multiarch of Ubuntu 12.04: `${LIB}` is `x86_64-linux-gnu`.
    Ubuntu1204,
    /// FHS library directories: `${LIB}` is `lib64` or `lib`.
    Fhs,
    /// Arch Linux's FHS variant on x86: `${LIB}` is `lib` or `lib32`.
    ArchLinux,
    /// `${PLATFORM}` expands to a known platform alias.
    Platform,
}

impl LibScheme {
    /// `${LIB}` schemes in order of preference.
    pub const LIB_CANDIDATES: [Self; 4] = [Self::Multiarch, Self::Ubuntu1204, Self::Fhs, Self::ArchLinux];

    /// What `${LIB}` must expand to for `arch` under this scheme, or `None`
    /// if the scheme does not exist for `arch` or is not `${LIB}`-based.
    #[must_use]
    pub const fn expected_lib(self, arch: &Architecture) -> Option<&'static str> {
        match self {
            Self::Multiarch => Some(arch.multiarch_lib),
            Self::Ubuntu1204 => Some(arch.tuple),
            Self::Fhs => Some(arch.fhs_lib),
            Self::ArchLinux => arch.arch_linux_lib,
            Self::Platform => None,
        }
    }

    /// Directory for `arch` relative to the layout root. Ubuntu 12.04 nests
    /// its `${LIB}` under `lib/`, so its directories match multiarch.
    #[must_use]
    pub const fn lib_subdir(self, arch: &Architecture) -> Option<&'static str> {
        match self {
            Self::Ubuntu1204 => Some(arch.multiarch_lib),
            _ => self.expected_lib(arch),
        }
    }

    /// Token path relative to the layout root.
    #[must_use]
    pub const fn token_suffix(self) -> &'static str {
        match self {
            Self::Ubuntu1204 => "lib/${LIB}",
            Self::Platform => PLATFORM_TOKEN,
            Self::Multiarch | Self::Fhs | Self::ArchLinux => LIB_TOKEN,
        }
    }

    /// Returns whether every architecture in `arches` agrees with this
    /// scheme. A probe that fails counts as disagreement.
    pub fn is_supported(self, info: &dyn SystemInfo, arches: &[Architecture]) -> bool {
        arches.iter().all(|arch| {
            if self == Self::Platform {
                return info.libdl_platform(arch).is_ok();
            }

            let Some(expected) = self.expected_lib(arch) else {
                return false;
            };
            match info.libdl_lib(arch) {
                Ok(actual) => actual == expected,
                Err(e) => {
                    tracing::debug!(arch = %arch, scheme = %self, "cannot probe ${{LIB}}: {e}");
                    false
                }
            }
        })
    }

    /// Picks the first `${LIB}` scheme all of `arches` agree with, or
    /// [`LibScheme::Platform`] if there is none.
    pub fn detect(info: &dyn SystemInfo, arches: &[Architecture]) -> Self {
        Self::LIB_CANDIDATES
            .into_iter()
            .find(|scheme| scheme.is_supported(info, arches))
            .unwrap_or(Self::Platform)
    }
}

impl fmt::Display for LibScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Multiarch => write!(f, "multiarch"),
            Self::Ubuntu1204 => write!(f, "ubuntu-12.04"),
            Self::Fhs => write!(f, "fhs"),
            Self::ArchLinux => write!(f, "arch-linux"),
            Self::Platform => write!(f, "platform"),
        }
    }
}
