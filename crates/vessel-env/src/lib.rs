//! # vessel-env
//!
//! Environment overlays for launching a process in a container.
//!
//! An [`EnvOverlay`] records, per variable, whether it is set to a value,
//! forced to be unset, or inherited unchanged. Overlays are built from
//! command-line options ([`cli`]) and consumed by applying them to an
//! environment block or serializing them for another process.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod cli;
pub mod overlay;
pub mod pattern;
pub mod shell;

pub use overlay::EnvOverlay;
