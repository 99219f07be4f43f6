//! Filesystem primitives the resolution walk is built on.
//!
//! The walk in [`super::resolve`] only ever opens, reads or creates a single
//! child of a directory it already holds open. The two backends differ in
//! how that child is named: descriptor-relative (`openat(2)` and friends on
//! the parent's descriptor) or as an absolute path string built from the
//! canonical path accumulated so far, anchored at the real root.

use std::ffi::OsString;
use std::fs::File;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::stat::Mode;

/// A directory (or, at the end of a walk, any object) reached so far.
#[derive(Debug)]
pub struct Level {
    /// Descriptor for the object, opened with `O_PATH` unless reopened.
    pub file: File,
    /// Canonical path relative to the root; empty for the root itself.
    pub path: String,
}

impl Level {
    /// Path of a child named `name` below this level.
    pub fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_owned()
        } else {
            format!("{}/{name}", self.path)
        }
    }

    /// Final segment of this level's path; `.` for the root.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().filter(|n| !n.is_empty()).unwrap_or(".")
    }
}

/// The operations a resolution backend has to provide.
pub trait Primitives {
    /// Whether `MKDIR_P` and `REJECT_SYMLINKS` are available.
    fn supports_restricted_flags(&self) -> bool;

    /// Opens the root of the walk as a path-only directory descriptor.
    fn open_root(&self) -> nix::Result<OwnedFd>;

    /// Opens `name` below `parent` with the given flags.
    fn open_at(&self, parent: &Level, name: &str, oflag: OFlag) -> nix::Result<OwnedFd>;

    /// Reads the target of the symlink `name` below `parent`.
    fn read_link_at(&self, parent: &Level, name: &str) -> nix::Result<OsString>;

    /// Creates the directory `name` below `parent`.
    fn mkdir_at(&self, parent: &Level, name: &str, mode: Mode) -> nix::Result<()>;
}

/// Descriptor-relative backend rooted at an open directory.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorRelative<'fd> {
    root: BorrowedFd<'fd>,
}

impl<'fd> DescriptorRelative<'fd> {
    pub const fn new(root: BorrowedFd<'fd>) -> Self {
        Self { root }
    }
}

impl Primitives for DescriptorRelative<'_> {
    fn supports_restricted_flags(&self) -> bool {
        true
    }

    fn open_root(&self) -> nix::Result<OwnedFd> {
        nix::fcntl::openat(
            self.root,
            ".",
            OFlag::O_PATH | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
            Mode::empty(),
        )
    }

    fn open_at(&self, parent: &Level, name: &str, oflag: OFlag) -> nix::Result<OwnedFd> {
        nix::fcntl::openat(parent.file.as_fd(), name, oflag, Mode::empty())
    }

    fn read_link_at(&self, parent: &Level, name: &str) -> nix::Result<OsString> {
        nix::fcntl::readlinkat(parent.file.as_fd(), name)
    }

    fn mkdir_at(&self, parent: &Level, name: &str, mode: Mode) -> nix::Result<()> {
        nix::sys::stat::mkdirat(parent.file.as_fd(), name, mode)
    }
}

/// Path-string backend anchored at the real `/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

impl Direct {
    fn absolute(parent: &Level, name: &str) -> String {
        format!("/{}", parent.child_path(name))
    }
}

impl Primitives for Direct {
    fn supports_restricted_flags(&self) -> bool {
        false
    }

    fn open_root(&self) -> nix::Result<OwnedFd> {
        nix::fcntl::open(
            "/",
            OFlag::O_PATH | OFlag::O_DIRECTORY | OFlag::O_CLOEXEC,
            Mode::empty(),
        )
    }

    fn open_at(&self, parent: &Level, name: &str, oflag: OFlag) -> nix::Result<OwnedFd> {
        nix::fcntl::open(Self::absolute(parent, name).as_str(), oflag, Mode::empty())
    }

    fn read_link_at(&self, parent: &Level, name: &str) -> nix::Result<OsString> {
        nix::fcntl::readlink(Self::absolute(parent, name).as_str())
    }

    fn mkdir_at(&self, _parent: &Level, _name: &str, _mode: Mode) -> nix::Result<()> {
        Err(Errno::ENOTSUP)
    }
}
