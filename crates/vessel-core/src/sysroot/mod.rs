//! Sysroots: directories treated as the root of a filesystem tree for
//! path resolution.
//!
//! A [`SysrootHandle`] is either descriptor-relative, holding an open
//! directory that every lookup is anchored to, or direct, resolving plain
//! absolute paths against the real `/`. Both run the same walk; see
//! [`resolve_in_sysroot`] for the algorithm and its guarantees.

mod backend;
mod flags;
mod resolve;

use std::fs::File;
use std::io::Read;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::{Path, PathBuf};

use nix::dir::Dir;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;
use serde::de::DeserializeOwned;

use vessel_common::constants::{FLATPAK_HOST_ROOT, FLATPAK_INFO};
use vessel_common::error::{FsErrorKind, Result, VesselError};

pub use self::flags::ResolveFlags;
pub use self::resolve::{Resolved, resolve_in_sysroot};

#[derive(Debug)]
enum Anchor {
    Descriptor(OwnedFd),
    Direct,
}

/// Handle to a root directory that paths are resolved inside.
///
/// The root is fixed for the handle's lifetime. Dropping the handle closes
/// its directory descriptor.
#[derive(Debug)]
pub struct SysrootHandle {
    path: PathBuf,
    anchor: Anchor,
}

impl SysrootHandle {
    /// Opens `path` as a descriptor-relative sysroot.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be opened as a directory.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let fd = nix::fcntl::open(
            path.as_path(),
            OFlag::O_PATH | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
            Mode::empty(),
        )
        .map_err(|e| {
            VesselError::from_os(
                std::io::Error::from(e),
                format!("Unable to open sysroot \"{}\"", path.display()),
            )
        })?;

        tracing::debug!(path = %path.display(), "opened sysroot");
        Ok(Self {
            path,
            anchor: Anchor::Descriptor(fd),
        })
    }

    /// Creates a direct sysroot, resolving absolute paths against the real
    /// root with plain path arithmetic.
    #[must_use]
    pub fn direct() -> Self {
        Self {
            path: PathBuf::from("/"),
            anchor: Anchor::Direct,
        }
    }

    /// Opens the real root directory as a descriptor-relative sysroot.
    ///
    /// # Errors
    ///
    /// Returns an error if `/` cannot be opened.
    pub fn real_root() -> Result<Self> {
        Self::new("/")
    }

    /// Opens the host system's root: `/run/host` when running inside a
    /// Flatpak sandbox, or the real root otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen root cannot be opened.
    pub fn flatpak_host() -> Result<Self> {
        if Path::new(FLATPAK_INFO).exists() {
            Self::new(FLATPAK_HOST_ROOT)
        } else {
            Self::real_root()
        }
    }

    /// Returns the absolute path of the root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether this sysroot resolves paths directly.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        matches!(self.anchor, Anchor::Direct)
    }

    /// Returns the root directory descriptor, if this is not a direct
    /// sysroot.
    #[must_use]
    pub fn fd(&self) -> Option<BorrowedFd<'_>> {
        match &self.anchor {
            Anchor::Descriptor(fd) => Some(fd.as_fd()),
            Anchor::Direct => None,
        }
    }

    /// Resolves `path` with every flag available to this kind of sysroot.
    ///
    /// Direct sysroots reject [`ResolveFlags::MKDIR_P`] and
    /// [`ResolveFlags::REJECT_SYMLINKS`] as not supported.
    ///
    /// # Errors
    ///
    /// See [`resolve_in_sysroot`].
    pub fn resolve(&self, path: &str, flags: ResolveFlags) -> Result<Resolved> {
        match &self.anchor {
            Anchor::Descriptor(fd) => resolve_in_sysroot(fd.as_fd(), path, flags),
            Anchor::Direct => resolve::walk(&backend::Direct, path, flags),
        }
    }

    /// Opens `path` inside the sysroot.
    ///
    /// This is the interface for readers of the sysroot: creating
    /// directories or rejecting symlinks are not available here, in either
    /// mode.
    ///
    /// # Errors
    ///
    /// Returns a not-supported error for [`ResolveFlags::MKDIR_P`] or
    /// [`ResolveFlags::REJECT_SYMLINKS`], otherwise see
    /// [`resolve_in_sysroot`].
    pub fn open_path(&self, path: &str, flags: ResolveFlags) -> Result<Resolved> {
        if flags.intersects(ResolveFlags::MKDIR_P | ResolveFlags::REJECT_SYMLINKS) {
            return Err(VesselError::io(
                FsErrorKind::NotSupported,
                format!("Flags {flags} are not supported when opening \"{path}\""),
            ));
        }

        self.resolve(path, flags).map_err(|e| {
            e.prefix(format!(
                "Unable to open \"{path}\" in \"{}\"",
                self.path.display()
            ))
        })
    }

    /// Returns `Ok` if `path` resolves inside the sysroot subject to the
    /// constraints in `flags`.
    ///
    /// # Errors
    ///
    /// Returns the reason resolution failed.
    pub fn test(&self, path: &str, flags: ResolveFlags) -> Result<()> {
        self.open_path(path, flags).map(drop)
    }

    /// Reads the regular file at `path` in full, returning its canonical
    /// path and its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not resolve to a readable regular
    /// file or reading fails.
    pub fn load(&self, path: &str, flags: ResolveFlags) -> Result<(String, Vec<u8>)> {
        let resolved = self.open_path(
            path,
            flags | ResolveFlags::READABLE | ResolveFlags::MUST_BE_REGULAR,
        )?;
        let mut file = File::from(resolved.fd);
        let mut contents = Vec::new();
        let _ = file.read_to_end(&mut contents).map_err(|e| {
            VesselError::from_os(e, format!("Unable to read \"{}\"", resolved.path))
        })?;

        tracing::debug!(path = %resolved.path, len = contents.len(), "loaded file from sysroot");
        Ok((resolved.path, contents))
    }

    /// Reads and parses the JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or does not parse.
    pub fn load_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (_, contents) = self.load(path, ResolveFlags::NONE)?;
        Ok(serde_json::from_slice(&contents)?)
    }

    /// Lists the `*.json` regular files directly inside `dir`, in sorted
    /// order.
    ///
    /// Names are read eagerly; each entry is resolved only when the
    /// iterator reaches it. A missing directory yields nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` exists but cannot be read as a directory.
    pub fn json_files(&self, dir: &str) -> Result<JsonFiles<'_>> {
        let flags = ResolveFlags::READABLE | ResolveFlags::MUST_BE_DIRECTORY;
        let resolved = match self.open_path(dir, flags) {
            Ok(resolved) => resolved,
            Err(e) if e.is(FsErrorKind::NotFound) => {
                tracing::debug!(dir, "no such directory, nothing to list");
                return Ok(JsonFiles {
                    sysroot: self,
                    dir: String::new(),
                    names: Vec::new().into_iter(),
                });
            }
            Err(e) => return Err(e),
        };

        let Resolved { fd, path: dir_path } = resolved;
        let list_error =
            |e: nix::Error| VesselError::from_os(e.into(), format!("Unable to list \"{dir_path}\""));
        let mut listing = Dir::from_fd(fd).map_err(list_error)?;

        let mut names = Vec::new();
        for entry in listing.iter() {
            let entry = entry.map_err(list_error)?;
            if let Ok(name) = entry.file_name().to_str() {
                if name.ends_with(".json") {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort();

        Ok(JsonFiles {
            sysroot: self,
            dir: dir_path,
            names: names.into_iter(),
        })
    }
}

/// Lazy iterator over the JSON files of one directory in a sysroot.
///
/// Yields the canonical path of each entry that resolves to a regular
/// file, skipping anything else. Finite; call
/// [`SysrootHandle::json_files`] again to restart.
#[derive(Debug)]
pub struct JsonFiles<'a> {
    sysroot: &'a SysrootHandle,
    dir: String,
    names: std::vec::IntoIter<String>,
}

impl Iterator for JsonFiles<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        for name in self.names.by_ref() {
            let candidate = format!("{}/{name}", self.dir);

            match self.sysroot.open_path(&candidate, ResolveFlags::MUST_BE_REGULAR) {
                Ok(resolved) => return Some(Ok(resolved.path)),
                Err(e) if e.is(FsErrorKind::NotRegularFile) || e.is(FsErrorKind::NotFound) => {
                    tracing::debug!(path = %candidate, "skipping: {e}");
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
