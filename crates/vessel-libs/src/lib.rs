//! # vessel-libs
//!
//! Temporary per-architecture library directories for a container.
//!
//! The dynamic linker expands `${LIB}` or `${PLATFORM}` in search paths to
//! a different string for each architecture. By laying out one directory
//! per architecture under a private root, a single path containing the
//! token reaches the right directory for whichever architecture is loading.
//! This crate probes how the tokens expand on the host, picks the layout
//! every architecture agrees on, and projects driver overrides into it.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod per_arch;
pub mod scheme;
pub mod system_info;

pub use per_arch::{PerArchDirs, set_up_overrides};
pub use scheme::LibScheme;
pub use system_info::SystemInfo;
