//! Shared utilities

pub mod config;
pub mod context;
pub mod fs;
pub mod process;
pub mod version;

pub use config::Config;
pub use context::{GlobalContext, InstallPaths};
pub use process::{CommandRunner, ProcessBuilder, SystemRunner};
pub use version::parse_version_flexible;
