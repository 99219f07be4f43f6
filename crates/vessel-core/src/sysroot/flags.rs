//! Behaviour flags for resolution inside a sysroot.

use std::fmt;
use std::ops::{BitOr, BitOrAssign, Sub};

/// Set of flags controlling [`resolve_in_sysroot`](super::resolve_in_sysroot).
///
/// Flags compose with `|`. [`MKDIR_P`](Self::MKDIR_P) and
/// [`REJECT_SYMLINKS`](Self::REJECT_SYMLINKS) are only honoured by
/// descriptor-relative sysroots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResolveFlags(u32);

impl ResolveFlags {
    /// No special behaviour.
    pub const NONE: Self = Self(0);
    /// Create the path and all of its ancestors as directories. Any that
    /// already exist must be directories or symlinks to directories.
    pub const MKDIR_P: Self = Self(1 << 0);
    /// If the last component is a symlink, return the symlink itself.
    pub const KEEP_FINAL_SYMLINK: Self = Self(1 << 1);
    /// Fail with too-many-links if any component is a symlink.
    pub const REJECT_SYMLINKS: Self = Self(1 << 2);
    /// Open the result for reading instead of as a path-only descriptor.
    pub const READABLE: Self = Self(1 << 3);
    /// The result must be a directory or a symlink to one.
    pub const MUST_BE_DIRECTORY: Self = Self(1 << 4);
    /// The result must be a regular file or a symlink to one.
    pub const MUST_BE_REGULAR: Self = Self(1 << 5);
    /// Report the canonical path with a leading `/`.
    pub const RETURN_ABSOLUTE: Self = Self(1 << 6);
    /// The result must have at least one execute bit, unless it is a
    /// directory.
    pub const MUST_BE_EXECUTABLE: Self = Self(1 << 7);

    const NAMES: [(Self, &'static str); 8] = [
        (Self::MKDIR_P, "mkdir-p"),
        (Self::KEEP_FINAL_SYMLINK, "keep-final-symlink"),
        (Self::REJECT_SYMLINKS, "reject-symlinks"),
        (Self::READABLE, "readable"),
        (Self::MUST_BE_DIRECTORY, "must-be-directory"),
        (Self::MUST_BE_REGULAR, "must-be-regular"),
        (Self::RETURN_ABSOLUTE, "return-absolute"),
        (Self::MUST_BE_EXECUTABLE, "must-be-executable"),
    ];

    /// Returns the raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns whether every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether any flag in `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns whether no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ResolveFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ResolveFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Sub for ResolveFlags {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 & !rhs.0)
    }
}

impl fmt::Display for ResolveFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }

        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_compose() {
        let flags = ResolveFlags::READABLE | ResolveFlags::MUST_BE_DIRECTORY;
        assert!(flags.contains(ResolveFlags::READABLE));
        assert!(!flags.contains(ResolveFlags::READABLE | ResolveFlags::MKDIR_P));
        assert!(flags.intersects(ResolveFlags::READABLE | ResolveFlags::MKDIR_P));
        assert_eq!(flags - ResolveFlags::READABLE, ResolveFlags::MUST_BE_DIRECTORY);
    }

    #[test]
    fn flags_display_names() {
        assert_eq!(ResolveFlags::NONE.to_string(), "none");
        assert_eq!(
            (ResolveFlags::MKDIR_P | ResolveFlags::RETURN_ABSOLUTE).to_string(),
            "mkdir-p|return-absolute"
        );
    }
}
