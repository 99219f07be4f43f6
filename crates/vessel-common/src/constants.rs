//! System-wide constants, environment variable names and the table of
//! supported architectures.

use crate::types::Architecture;

/// Maximum number of symlinks followed while resolving one path.
pub const MAX_SYMLINK_TRAVERSALS: usize = 40;

/// Mode for directories created while resolving with `MKDIR_P`.
pub const RESOLVE_MKDIR_MODE: u32 = 0o755;

/// Mode for the per-architecture temporary directories.
pub const PER_ARCH_DIR_MODE: u32 = 0o700;

/// Prefix of the temporary per-architecture library tree; a six character
/// unique suffix is appended.
pub const PER_ARCH_TEMPLATE_PREFIX: &str = "pressure-vessel-libs-";

/// Dynamic linker token expanding to the library directory.
pub const LIB_TOKEN: &str = "${LIB}";

/// Dynamic linker token expanding to the platform alias.
pub const PLATFORM_TOKEN: &str = "${PLATFORM}";

/// Variable pointing libvdpau at its driver directory.
pub const VDPAU_DRIVER_PATH: &str = "VDPAU_DRIVER_PATH";

/// Name of the driver subdirectory projected from an overrides tree.
pub const VDPAU_SUBDIR: &str = "vdpau";

/// When set, per-arch layout probing uses predictable mock answers.
pub const ENV_TEST_STANDARDIZE_PLATFORM: &str = "PRESSURE_VESSEL_TEST_STANDARDIZE_PLATFORM";

/// Directory containing `<tuple>-<helper>` executables.
pub const ENV_HELPERS_PATH: &str = "SRT_HELPERS_PATH";

/// Default location of the helper executables.
pub const DEFAULT_HELPERS_PATH: &str = "/usr/libexec/steam-runtime-tools-0";

/// File whose presence marks a Flatpak sandbox.
pub const FLATPAK_INFO: &str = "/.flatpak-info";

/// Where Flatpak exposes the host filesystem.
pub const FLATPAK_HOST_ROOT: &str = "/run/host";

/// Helper printing the `${LIB}` expansion for its architecture.
pub const HELPER_DETECT_LIB: &str = "detect-lib";

/// Helper printing the `${PLATFORM}` expansion for its architecture.
pub const HELPER_DETECT_PLATFORM: &str = "detect-platform";

/// Platform alias reported by the standardized mock on non-x86 hosts.
pub const MOCK_PLATFORM: &str = "mock";

/// The 64-bit x86 architecture.
pub const X86_64: Architecture = Architecture {
    tuple: "x86_64-linux-gnu",
    multiarch_lib: "lib/x86_64-linux-gnu",
    fhs_lib: "lib64",
    arch_linux_lib: Some("lib"),
    platforms: &["xeon_phi", "haswell", "x86_64"],
};

/// The 32-bit x86 architecture.
pub const I386: Architecture = Architecture {
    tuple: "i386-linux-gnu",
    multiarch_lib: "lib/i386-linux-gnu",
    fhs_lib: "lib",
    arch_linux_lib: Some("lib32"),
    platforms: &["i686", "i586", "i486", "i386"],
};

/// The 64-bit ARM architecture.
pub const AARCH64: Architecture = Architecture {
    tuple: "aarch64-linux-gnu",
    multiarch_lib: "lib/aarch64-linux-gnu",
    fhs_lib: "lib",
    arch_linux_lib: None,
    platforms: &["aarch64"],
};

/// Architectures a container launch prepares libraries for on this host.
#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
pub const SUPPORTED_ARCHITECTURES: &[Architecture] = &[X86_64, I386];

/// Architectures a container launch prepares libraries for on this host.
#[cfg(target_arch = "aarch64")]
pub const SUPPORTED_ARCHITECTURES: &[Architecture] = &[AARCH64];

/// Architectures a container launch prepares libraries for on this host.
#[cfg(not(any(target_arch = "x86_64", target_arch = "x86", target_arch = "aarch64")))]
pub const SUPPORTED_ARCHITECTURES: &[Architecture] = &[];

/// Application name used in CLI output.
pub const APP_NAME: &str = "vessel";
