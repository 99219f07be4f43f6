//! The temporary per-architecture directory tree.

use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use vessel_common::config::VesselConfig;
use vessel_common::constants::{
    PER_ARCH_DIR_MODE, PER_ARCH_TEMPLATE_PREFIX, VDPAU_DRIVER_PATH, VDPAU_SUBDIR,
};
use vessel_common::error::{FsErrorKind, Result, VesselError};
use vessel_common::types::Architecture;
use vessel_env::EnvOverlay;

use crate::{LibScheme, SystemInfo};

/// One architecture's directory in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbiDir {
    /// The architecture.
    pub arch: Architecture,
    /// Absolute path of its directory.
    pub path: PathBuf,
}

/// A private temporary tree with one directory per architecture, and a
/// path containing a dynamic linker token that expands to each of them.
///
/// The whole tree is deleted when this value is dropped.
#[derive(Debug, Serialize)]
pub struct PerArchDirs {
    root: PathBuf,
    scheme: LibScheme,
    token_path: String,
    abi_dirs: Vec<AbiDir>,
}

impl PerArchDirs {
    /// Creates the tree under the configured temporary directory, choosing
    /// the layout every architecture in `arches` agrees on.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary root or any architecture's
    /// directory cannot be created, or if the `${PLATFORM}` fallback is
    /// needed and some architecture's platform is unknown. Anything
    /// already created is removed.
    pub fn new(info: &dyn SystemInfo, arches: &[Architecture], config: &VesselConfig) -> Result<Self> {
        let template = config
            .temp_dir
            .join(format!("{PER_ARCH_TEMPLATE_PREFIX}XXXXXX"));
        let root = nix::unistd::mkdtemp(&template).map_err(|e| {
            VesselError::from_os(
                std::io::Error::from(e),
                "Cannot create temporary directory for platform specific libraries",
            )
        })?;

        let scheme = LibScheme::detect(info, arches);
        let token_path = root.join(scheme.token_suffix());
        let token_path = token_path
            .to_str()
            .ok_or_else(|| VesselError::Config {
                message: format!("Temporary directory \"{}\" is not valid UTF-8", root.display()),
            })?
            .to_owned();

        let mut dirs = Self {
            root,
            scheme,
            token_path,
            abi_dirs: Vec::with_capacity(arches.len()),
        };

        for arch in arches {
            let subdir = match scheme.lib_subdir(arch) {
                Some(lib) => lib.to_owned(),
                None => info.libdl_platform(arch).map_err(|e| {
                    e.prefix("Unknown expansion of the dl string token $PLATFORM")
                })?,
            };
            dirs.abi_dirs.push(AbiDir {
                arch: *arch,
                path: dirs.root.join(subdir),
            });
        }

        for abi in &dirs.abi_dirs {
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(PER_ARCH_DIR_MODE)
                .create(&abi.path)
                .map_err(|e| {
                    VesselError::from_os(e, format!("Unable to create \"{}\"", abi.path.display()))
                })?;
        }

        tracing::info!(
            root = %dirs.root.display(),
            scheme = %dirs.scheme,
            token_path = %dirs.token_path,
            "created per-architecture library directories"
        );
        Ok(dirs)
    }

    /// Root of the temporary tree.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Layout in use.
    #[must_use]
    pub const fn scheme(&self) -> LibScheme {
        self.scheme
    }

    /// Path containing `${LIB}` or `${PLATFORM}` that the dynamic linker
    /// expands to each architecture's directory.
    #[must_use]
    pub fn token_path(&self) -> &str {
        &self.token_path
    }

    /// Per-architecture directories, in the order the architectures were
    /// given.
    #[must_use]
    pub fn abi_dirs(&self) -> &[AbiDir] {
        &self.abi_dirs
    }

    /// Directory for `arch`, if it is part of this tree.
    #[must_use]
    pub fn abi_path(&self, arch: &Architecture) -> Option<&Path> {
        self.abi_dirs
            .iter()
            .find(|abi| abi.arch == *arch)
            .map(|abi| abi.path.as_path())
    }

    /// Keeps the tree on disk, returning its root.
    #[must_use]
    pub fn persist(mut self) -> PathBuf {
        std::mem::take(&mut self.root)
    }
}

impl Drop for PerArchDirs {
    fn drop(&mut self) {
        if self.root.as_os_str().is_empty() {
            return;
        }
        if let Err(e) = vessel_core::fs::rm_rf(&self.root) {
            tracing::warn!(root = %self.root.display(), "unable to remove per-architecture directories: {e}");
        }
    }
}

/// Projects the VDPAU drivers of an overrides tree into the per-arch
/// directories and points `VDPAU_DRIVER_PATH` at them.
///
/// For each architecture with a directory `<overrides>/<tuple>/vdpau`, a
/// symlink to it is created as `vdpau` in that architecture's directory.
///
/// # Errors
///
/// Returns an error if `dirs` is `None` (the tree could not be created)
/// or a symlink cannot be created.
pub fn set_up_overrides(
    env: &mut EnvOverlay,
    dirs: Option<&PerArchDirs>,
    overrides: &Path,
) -> Result<()> {
    let dirs = dirs.ok_or_else(|| {
        VesselError::io(FsErrorKind::Failed, "Unable to set up VDPAU driver search path")
    })?;

    for abi in &dirs.abi_dirs {
        let target = overrides.join(abi.arch.tuple).join(VDPAU_SUBDIR);
        if !target.is_dir() {
            continue;
        }

        let link = abi.path.join(VDPAU_SUBDIR);
        tracing::debug!(link = %link.display(), target = %target.display(), "creating symlink");
        std::os::unix::fs::symlink(&target, &link).map_err(|e| {
            VesselError::from_os(e, format!("Cannot create symlink \"{}\"", link.display()))
        })?;
    }

    let value = format!("{}/{VDPAU_SUBDIR}", dirs.token_path);
    tracing::debug!(value = %value, "setting {VDPAU_DRIVER_PATH}");
    env.set(VDPAU_DRIVER_PATH, Some(&value));
    Ok(())
}
