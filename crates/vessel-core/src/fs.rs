//! Filesystem housekeeping.
//!
//! Recursive deletion of temporary trees. Every directory is walked
//! through its own descriptor, so symlinks are removed and never followed
//! even if the tree changes underneath. Nothing mounted below the tree is
//! touched.

use std::ffi::{CString, OsStr};
use std::fs::{self, File};
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use nix::dir::Dir;
use nix::errno::Errno;
use nix::fcntl::{AtFlags, OFlag};
use nix::sys::stat::{Mode, SFlag};
use nix::unistd::UnlinkatFlags;

use vessel_common::error::{Result, VesselError};

const DIR_FLAGS: OFlag = OFlag::O_RDONLY
    .union(OFlag::O_DIRECTORY)
    .union(OFlag::O_NOFOLLOW)
    .union(OFlag::O_CLOEXEC);

fn os_error(errno: Errno, action: &str, path: &Path) -> VesselError {
    VesselError::from_os(errno.into(), format!("Unable to {action} \"{}\"", path.display()))
}

/// Recursively deletes `path`.
///
/// Does not follow symlinks, including `path` itself, and does not descend
/// into anything on a different device from `path`. A missing `path` is
/// not an error.
///
/// # Errors
///
/// Returns an error if any entry cannot be listed or removed.
pub fn rm_rf(path: &Path) -> Result<()> {
    let root = match nix::fcntl::open(path, DIR_FLAGS, Mode::empty()) {
        Ok(fd) => fd,
        Err(Errno::ENOENT) => return Ok(()),
        Err(Errno::ENOTDIR | Errno::ELOOP) => {
            return match fs::remove_file(path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(VesselError::from_os(
                    e,
                    format!("Unable to remove \"{}\"", path.display()),
                )),
                _ => Ok(()),
            };
        }
        Err(e) => return Err(os_error(e, "open", path)),
    };

    let root = File::from(root);
    let device = root
        .metadata()
        .map_err(|e| VesselError::from_os(e, format!("Unable to stat \"{}\"", path.display())))?
        .dev();

    clear_dir(&OwnedFd::from(root), path, device)?;
    fs::remove_dir(path)
        .map_err(|e| VesselError::from_os(e, format!("Unable to remove \"{}\"", path.display())))?;
    tracing::debug!(path = %path.display(), "removed tree");
    Ok(())
}

/// Removes everything inside the open directory `dir`, shown as `path` in
/// errors.
fn clear_dir(dir: &OwnedFd, path: &Path, device: u64) -> Result<()> {
    let listing_fd = dir
        .try_clone()
        .map_err(|e| VesselError::from_os(e, format!("Unable to list \"{}\"", path.display())))?;
    let mut listing = Dir::from_fd(listing_fd).map_err(|e| os_error(e, "list", path))?;

    let mut names: Vec<CString> = Vec::new();
    for entry in listing.iter() {
        let entry = entry.map_err(|e| os_error(e, "list", path))?;
        let name = entry.file_name();
        if name.to_bytes() != b"." && name.to_bytes() != b".." {
            names.push(name.to_owned());
        }
    }
    drop(listing);

    for name in names {
        let child = path.join(OsStr::from_bytes(name.to_bytes()));
        let stat = nix::sys::stat::fstatat(dir.as_fd(), name.as_c_str(), AtFlags::AT_SYMLINK_NOFOLLOW)
            .map_err(|e| os_error(e, "stat", &child))?;

        if SFlag::from_bits_truncate(stat.st_mode) & SFlag::S_IFMT != SFlag::S_IFDIR {
            nix::unistd::unlinkat(dir.as_fd(), name.as_c_str(), UnlinkatFlags::NoRemoveDir)
                .map_err(|e| os_error(e, "remove", &child))?;
            continue;
        }

        if stat.st_dev != device {
            tracing::warn!(path = %child.display(), "not removing mount point");
            continue;
        }

        let child_fd = nix::fcntl::openat(dir.as_fd(), name.as_c_str(), DIR_FLAGS, Mode::empty())
            .map_err(|e| os_error(e, "open", &child))?;
        clear_dir(&child_fd, &child, device)?;
        drop(child_fd);

        nix::unistd::unlinkat(dir.as_fd(), name.as_c_str(), UnlinkatFlags::RemoveDir)
            .map_err(|e| os_error(e, "remove", &child))?;
    }
    Ok(())
}
