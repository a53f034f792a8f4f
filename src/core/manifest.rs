//! Per-directory `moor.toml` files.
//!
//! A config file may appear in any directory. It names the directory's
//! target package and carries project-wide facts (executables, ignored
//! directories, installation directives, remote packages). Paths are
//! relative to the directory holding the file.
//!
//! ```toml
//! package = "example/arch"
//! ignore = ["testdata"]
//!
//! [executables]
//! "bin/tool" = ["cmd/main.go"]
//!
//! [install]
//! package = true
//!
//! [[remote]]
//! imports = ["github.com/user/lib"]
//! kind = "github"
//! repository = "user/lib"
//! install = ["make", "install"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::CONFIG_FILE_NAME;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DirManifest {
    /// Import path of the package built from this directory's sources.
    pub package: Option<String>,

    /// Lowest toolchain version able to build this directory.
    pub min_toolchain_version: Option<String>,

    /// Directories the walker must not descend into.
    pub ignore: Vec<String>,

    /// Files excluded from `moor fmt`.
    pub no_fmt: Vec<String>,

    /// Package sources; all `.go` files of the directory when absent.
    pub sources: Option<Vec<String>>,

    /// Executable path mapped to the sources it is linked from.
    pub executables: BTreeMap<String, Vec<String>>,

    pub install: InstallSection,

    #[serde(rename = "remote")]
    pub remotes: Vec<RemoteSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallSection {
    pub package: bool,
    pub executables: Vec<String>,
    pub dirs: Vec<InstallDirSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallDirSection {
    pub src: String,
    pub dst: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSection {
    pub imports: Vec<String>,
    pub kind: String,
    pub repository: String,
    pub install: Vec<String>,
}

impl DirManifest {
    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = crate::util::fs::read_to_string(path)?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// Whether `name` is the per-directory config file, ignoring case.
pub fn is_config_file_name(name: &str) -> bool {
    name.len() == CONFIG_FILE_NAME.len() && name.eq_ignore_ascii_case(CONFIG_FILE_NAME)
}
