//! The build graph engine.
//!
//! This module discovers a project's files, infers what they build, and
//! runs the toolchain to bring stale products up to date.

pub mod clean;
pub mod context;
pub mod infer;
pub mod make;
pub mod makefile;
pub mod tests;
pub mod toolchain;
pub mod walker;

pub use clean::clean;
pub use context::BuildContext;
pub use infer::infer_all;
pub use make::{install_dyn_library, install_executable, make, make_tests};
pub use tests::{run_tests, TestFilter};
pub use toolchain::{CommandSpec, Toolchain, ToolchainKind};
pub use walker::walk;
