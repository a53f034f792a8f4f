//! Moor - a convention-based incremental build tool for Go source trees
//!
//! This crate provides the core library functionality for Moor: discovering
//! a project's files, inferring what they build, resolving imports, and
//! bringing stale products up to date.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Test utilities for Moor unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a recording command runner and project
/// fixtures.
#[cfg(test)]
pub mod test_support;

pub use builder::BuildContext;
pub use core::{BuildGraph, NodeId, NodeKind, Workspace};
pub use resolver::ImportRegistry;
pub use util::context::GlobalContext;
