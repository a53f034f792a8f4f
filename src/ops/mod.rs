//! High-level operations.
//!
//! This module contains the implementation of Moor commands. Each operation
//! takes a loaded [`BuildContext`](crate::builder::BuildContext); see
//! [`moor_load`] for how one is created.

pub mod moor_clean;
pub mod moor_fmt;
pub mod moor_info;
pub mod moor_install;
pub mod moor_load;
pub mod moor_make;
pub mod moor_remote;

pub use moor_clean::clean;
pub use moor_fmt::fmt;
pub use moor_info::{Inventory, Product, RemoteDependency};
pub use moor_install::{install, uninstall};
pub use moor_load::{boot, load, open, LoadOptions};
pub use moor_make::{make, make_tests};
pub use moor_remote::{install_deps, install_remote_packages};
pub use moor_test::run_tests;
