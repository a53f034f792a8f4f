//! Core data structures for Moor.
//!
//! This module contains the object graph and the facts it is built from:
//! - Filesystem entries and the node arena
//! - Source scanning and test-driver generation
//! - Per-directory config files and project-wide facts

pub mod contents;
pub mod entry;
pub mod errors;
pub mod graph;
pub mod makefile;
pub mod manifest;
pub mod node;
pub mod test_driver;
pub mod workspace;

pub use entry::Entry;
pub use errors::{ConfigError, GraphError};
pub use graph::BuildGraph;
pub use manifest::DirManifest;
pub use node::{NodeId, NodeKind};
pub use workspace::{InstallDirective, Workspace};

/// Per-directory config file, matched case-insensitively.
pub const CONFIG_FILE_NAME: &str = "moor.toml";

/// Name of the Makefile escape hatch.
pub const MAKEFILE_NAME: &str = "Makefile";

/// Intermediate directory for normal builds.
pub const OBJ_DIR: &str = "_obj";

/// Intermediate directory for test builds.
pub const TEST_DIR: &str = "_test";

/// Generated test driver inside [`TEST_DIR`].
pub const TEST_DRIVER_NAME: &str = "main.go";

/// Static library extension.
pub const LIB_EXT: &str = ".a";

/// Executable name when a `main` package has no explicit mapping.
pub const DEFAULT_EXE_NAME: &str = "a.out";

/// Name of generated test binaries.
pub const TEST_EXE_NAME: &str = "package-test";

/// Package name of program entry points.
pub const ENTRY_PACKAGE: &str = "main";

/// Go source extension.
pub const SOURCE_EXT: &str = ".go";

/// Suffix of test sources.
pub const TEST_SOURCE_SUFFIX: &str = "_test.go";

/// Whether `name` is one of the intermediate directories.
pub fn is_temp_dir_name(name: &str) -> bool {
    name == OBJ_DIR || name == TEST_DIR
}
