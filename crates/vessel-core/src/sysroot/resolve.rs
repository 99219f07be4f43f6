//! Symlink-safe path resolution anchored inside a root directory.
//!
//! The walk keeps every directory it descends through open, so `..` is a
//! pop rather than a lookup and can never climb above the root. Symlink
//! targets are spliced into the queue of pending components; an absolute
//! target restarts from the root of the walk, not from the host's `/`.

use std::collections::VecDeque;
use std::fs::File;
use std::os::fd::{BorrowedFd, OwnedFd};
use std::os::unix::fs::PermissionsExt;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;

use vessel_common::constants::{MAX_SYMLINK_TRAVERSALS, RESOLVE_MKDIR_MODE};
use vessel_common::error::{FsErrorKind, Result, VesselError};

use super::backend::{DescriptorRelative, Level, Primitives};
use super::flags::ResolveFlags;

/// Outcome of a successful resolution.
#[derive(Debug)]
pub struct Resolved {
    /// Descriptor for the target: `O_PATH` unless
    /// [`ResolveFlags::READABLE`] was requested.
    pub fd: OwnedFd,
    /// Canonical path of the target, relative to the root (`.` for the root
    /// itself), or with a leading `/` if
    /// [`ResolveFlags::RETURN_ABSOLUTE`] was requested.
    pub path: String,
}

impl Resolved {
    /// Consumes the result, keeping only the descriptor.
    #[must_use]
    pub fn into_fd(self) -> OwnedFd {
        self.fd
    }
}

/// Resolves `descendant` inside the directory `sysroot` as though `sysroot`
/// were the root directory.
///
/// This is the low-level entry point: every [`ResolveFlags`] is available,
/// including [`ResolveFlags::MKDIR_P`] and
/// [`ResolveFlags::REJECT_SYMLINKS`].
///
/// # Errors
///
/// Returns a [`VesselError::Io`] classified as not-found, not-a-directory,
/// not-a-regular-file, too-many-links, permission-denied or failed. No
/// descriptor opened during the walk outlives a failure.
pub fn resolve_in_sysroot(
    sysroot: BorrowedFd<'_>,
    descendant: &str,
    flags: ResolveFlags,
) -> Result<Resolved> {
    walk(&DescriptorRelative::new(sysroot), descendant, flags)
}

/// Splits a path into its meaningful components, dropping empty and `.`
/// segments.
fn components(path: &str) -> impl DoubleEndedIterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty() && *c != ".")
}

/// Returns whether the spelling of `path` alone requires a directory: a
/// trailing `/` or a final `.` after at least one other component, as in
/// `lib/` or `lib/.`.
fn spelled_as_directory(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    (path.ends_with('/') || last == ".") && components(path).next().is_some()
}

fn errno_error(errno: Errno, message: impl Into<String>) -> VesselError {
    VesselError::from_os(std::io::Error::from(errno), message)
}

fn metadata_error(err: std::io::Error, path: &str) -> VesselError {
    VesselError::from_os(err, format!("Unable to stat \"{path}\""))
}

fn open_no_follow<P: Primitives>(prims: &P, parent: &Level, name: &str) -> nix::Result<OwnedFd> {
    prims.open_at(
        parent,
        name,
        OFlag::O_PATH | OFlag::O_NOFOLLOW | OFlag::O_CLOEXEC,
    )
}

/// Opens `name` below `parent`, creating it as a directory first when it is
/// missing and `mkdir_p` is set.
fn open_or_create<P: Primitives>(
    prims: &P,
    parent: &Level,
    name: &str,
    mkdir_p: bool,
) -> Result<File> {
    let path = parent.child_path(name);

    match open_no_follow(prims, parent, name) {
        Ok(fd) => Ok(File::from(fd)),
        Err(Errno::ENOENT) if mkdir_p => {
            match prims.mkdir_at(parent, name, Mode::from_bits_truncate(RESOLVE_MKDIR_MODE)) {
                Ok(()) | Err(Errno::EEXIST) => {}
                Err(e) => return Err(errno_error(e, format!("Unable to create \"{path}\""))),
            }
            tracing::debug!(path = %path, "created directory");
            open_no_follow(prims, parent, name)
                .map(File::from)
                .map_err(|e| errno_error(e, format!("Unable to open \"{path}\"")))
        }
        Err(e) => Err(errno_error(e, format!("Unable to open \"{path}\""))),
    }
}

/// The resolution walk shared by every backend.
pub(crate) fn walk<P: Primitives>(
    prims: &P,
    descendant: &str,
    flags: ResolveFlags,
) -> Result<Resolved> {
    if flags.intersects(ResolveFlags::MKDIR_P | ResolveFlags::REJECT_SYMLINKS)
        && !prims.supports_restricted_flags()
    {
        return Err(VesselError::io(
            FsErrorKind::NotSupported,
            format!("Resolving \"{descendant}\" with flags {flags} requires a sysroot descriptor"),
        ));
    }

    let mkdir_p = flags.contains(ResolveFlags::MKDIR_P);
    let trailing_directory = spelled_as_directory(descendant);
    let must_be_directory =
        trailing_directory || flags.intersects(ResolveFlags::MUST_BE_DIRECTORY | ResolveFlags::MKDIR_P);

    let root = prims
        .open_root()
        .map_err(|e| errno_error(e, "Unable to open root directory"))?;
    let mut current = Level {
        file: File::from(root),
        path: String::new(),
    };
    let mut ancestors: Vec<Level> = Vec::new();
    let mut pending: VecDeque<String> = components(descendant).map(str::to_owned).collect();
    let mut traversals = 0usize;

    while let Some(name) = pending.pop_front() {
        if name == ".." {
            if let Some(parent) = ancestors.pop() {
                current = parent;
            }
            continue;
        }

        let is_final = pending.is_empty();
        let path = current.child_path(&name);
        let file = open_or_create(prims, &current, &name, mkdir_p)?;
        let metadata = file.metadata().map_err(|e| metadata_error(e, &path))?;

        if metadata.file_type().is_symlink() {
            if is_final && !trailing_directory && flags.contains(ResolveFlags::KEEP_FINAL_SYMLINK) {
                ancestors.push(std::mem::replace(&mut current, Level { file, path }));
                break;
            }

            if flags.contains(ResolveFlags::REJECT_SYMLINKS) {
                return Err(VesselError::io(
                    FsErrorKind::TooManyLinks,
                    format!("\"{path}\" is a symbolic link"),
                ));
            }

            traversals += 1;
            if traversals > MAX_SYMLINK_TRAVERSALS {
                return Err(VesselError::io(
                    FsErrorKind::TooManyLinks,
                    format!("Too many levels of symbolic links resolving \"{descendant}\""),
                ));
            }

            let target = prims
                .read_link_at(&current, &name)
                .map_err(|e| errno_error(e, format!("Unable to read symlink \"{path}\"")))?
                .into_string()
                .map_err(|_| {
                    VesselError::io(
                        FsErrorKind::Failed,
                        format!("Target of symlink \"{path}\" is not valid UTF-8"),
                    )
                })?;

            tracing::trace!(link = %path, target = %target, "following symlink");

            if target.starts_with('/') {
                ancestors.truncate(1);
                if let Some(root) = ancestors.pop() {
                    current = root;
                }
            }

            for segment in components(&target).rev() {
                pending.push_front(segment.to_owned());
            }
            continue;
        }

        if !is_final && !metadata.is_dir() {
            return Err(VesselError::io(
                FsErrorKind::NotDirectory,
                format!("\"{path}\" is not a directory"),
            ));
        }

        ancestors.push(std::mem::replace(&mut current, Level { file, path }));
    }

    finish(prims, current, ancestors.last(), flags, must_be_directory)
}

/// Applies type constraints to the object the walk ended on and, if
/// requested, reopens it for reading.
fn finish<P: Primitives>(
    prims: &P,
    target: Level,
    parent: Option<&Level>,
    flags: ResolveFlags,
    must_be_directory: bool,
) -> Result<Resolved> {
    let shown = if target.path.is_empty() { "/" } else { target.path.as_str() };
    let metadata = target
        .file
        .metadata()
        .map_err(|e| metadata_error(e, shown))?;
    let file_type = metadata.file_type();

    if must_be_directory && !file_type.is_dir() {
        return Err(VesselError::io(
            FsErrorKind::NotDirectory,
            format!("\"{shown}\" is not a directory"),
        ));
    }

    if flags.contains(ResolveFlags::MUST_BE_REGULAR) && !file_type.is_file() {
        return Err(VesselError::io(
            FsErrorKind::NotRegularFile,
            format!("\"{shown}\" is not a regular file"),
        ));
    }

    if flags.contains(ResolveFlags::MUST_BE_EXECUTABLE)
        && !file_type.is_dir()
        && metadata.permissions().mode() & 0o111 == 0
    {
        return Err(VesselError::io(
            FsErrorKind::Failed,
            format!("\"{shown}\" is not executable"),
        ));
    }

    let fd = if flags.contains(ResolveFlags::READABLE) {
        let mut oflag = OFlag::O_RDONLY | OFlag::O_NOCTTY | OFlag::O_NOFOLLOW | OFlag::O_CLOEXEC;
        if must_be_directory {
            oflag |= OFlag::O_DIRECTORY;
        }

        let reopened = match parent {
            Some(parent) => prims.open_at(parent, target.name(), oflag),
            None => prims.open_at(&target, ".", oflag),
        };
        reopened.map_err(|e| errno_error(e, format!("Unable to open \"{shown}\" for reading")))?
    } else {
        OwnedFd::from(target.file)
    };

    let path = match (flags.contains(ResolveFlags::RETURN_ABSOLUTE), target.path.is_empty()) {
        (true, _) => format!("/{}", target.path),
        (false, true) => ".".to_owned(),
        (false, false) => target.path,
    };

    Ok(Resolved { fd, path })
}
