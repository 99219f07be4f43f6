//! Unified error types for the vessel workspace.
//!
//! Filesystem failures carry a small closed [`FsErrorKind`] so callers can
//! either match an exact kind (for example treating [`FsErrorKind::NotFound`]
//! as "absent, not fatal") or accept any I/O-domain failure via
//! [`VesselError::is_io`].

use std::fmt;

use thiserror::Error;

/// Closed classification of filesystem failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsErrorKind {
    /// A path component does not exist.
    NotFound,
    /// A component that had to be a directory is not one.
    NotDirectory,
    /// The target had to be a regular file and is not one.
    NotRegularFile,
    /// A symlink loop, or a symlink where symlinks are rejected.
    TooManyLinks,
    /// The operating system refused access.
    PermissionDenied,
    /// The requested behaviour is not available in this mode.
    NotSupported,
    /// Any other failure.
    Failed,
}

impl FsErrorKind {
    /// Classifies a raw OS error number.
    #[must_use]
    pub const fn from_raw_os_error(errno: i32) -> Self {
        match errno {
            libc::ENOENT => Self::NotFound,
            libc::ENOTDIR => Self::NotDirectory,
            libc::ELOOP => Self::TooManyLinks,
            libc::EACCES | libc::EPERM => Self::PermissionDenied,
            libc::ENOTSUP => Self::NotSupported,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for FsErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::NotDirectory => write!(f, "not a directory"),
            Self::NotRegularFile => write!(f, "not a regular file"),
            Self::TooManyLinks => write!(f, "too many levels of symbolic links"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::NotSupported => write!(f, "not supported"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum VesselError {
    /// A filesystem operation failed.
    #[error("{message}")]
    Io {
        /// Classification of the failure.
        kind: FsErrorKind,
        /// Human-readable description, including the path involved.
        message: String,
        /// Underlying OS error, when there is one.
        #[source]
        source: Option<std::io::Error>,
    },

    /// A command-line option was given a malformed value.
    #[error("{message}")]
    BadValue {
        /// Option that received the value, such as `--env`.
        option: String,
        /// Description naming the offending value.
        message: String,
    },

    /// A configuration value or runtime precondition is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A helper subprocess could not be run or reported failure.
    #[error("{message}")]
    Subprocess {
        /// Description of the failure, usually the helper's stderr.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl VesselError {
    /// Creates a filesystem error without an underlying OS error.
    pub fn io(kind: FsErrorKind, message: impl Into<String>) -> Self {
        Self::Io {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a filesystem error from an OS error, classifying it.
    pub fn from_os(source: std::io::Error, message: impl Into<String>) -> Self {
        let kind = source
            .raw_os_error()
            .map_or(FsErrorKind::Failed, FsErrorKind::from_raw_os_error);
        let message = format!("{}: {source}", message.into());
        Self::Io {
            kind,
            message,
            source: Some(source),
        }
    }

    /// Creates a bad-value error for the given option.
    pub fn bad_value(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadValue {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Returns the filesystem classification, if this is an I/O error.
    #[must_use]
    pub const fn kind(&self) -> Option<FsErrorKind> {
        match self {
            Self::Io { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns whether this is any filesystem error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns whether this is a filesystem error of exactly `kind`.
    #[must_use]
    pub fn is(&self, kind: FsErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    /// Prepends context to the error message, keeping its classification.
    #[must_use]
    pub fn prefix(mut self, context: impl fmt::Display) -> Self {
        match &mut self {
            Self::Io { message, .. }
            | Self::BadValue { message, .. }
            | Self::Config { message }
            | Self::Subprocess { message } => {
                *message = format!("{context}: {message}");
            }
            Self::Serialization { .. } => {}
        }
        self
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VesselError>;
