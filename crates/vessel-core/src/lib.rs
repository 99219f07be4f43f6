//! # vessel-core
//!
//! Low-level filesystem primitives for preparing a container's view of a
//! host or runtime tree.
//!
//! This crate provides:
//! - **Sysroots**: resolving paths inside a directory as though it were `/`,
//!   with symlinks and `..` confined to it.
//! - **Housekeeping**: removing temporary trees without following symlinks.
//! - **Helpers**: running per-architecture helper executables with an
//!   explicit environment, refusing to do so when setuid.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod fs;
pub mod setuid;
pub mod subprocess;
pub mod sysroot;
