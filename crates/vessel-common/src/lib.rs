//! # vessel-common
//!
//! Shared error taxonomy, architecture tables, configuration model and
//! constants used across the entire vessel workspace.
//!
//! This crate is the leaf of the dependency graph. It depends on no other
//! internal crate and provides the foundational primitives that the
//! sysroot resolver, the environment overlay and the per-architecture
//! library layout build upon.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
