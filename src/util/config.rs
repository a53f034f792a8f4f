//! Configuration file support for Moor.
//!
//! Moor supports two configuration file locations:
//! - Global: `~/.moor/config.toml` - User-wide defaults
//! - Project: `.moor/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. These files describe
//! the tools and install locations; what to build is described by the
//! `moor.toml` files inside the source tree.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Moor configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Toolchain settings
    pub toolchain: ToolchainSettings,

    /// Install locations
    pub install: InstallSettings,
}

/// Which toolchain to drive and how to invoke it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolchainSettings {
    /// `gc` or `gccgo`
    pub kind: Option<String>,

    /// Compiler command prefix (e.g. `["go", "tool", "compile"]`)
    pub compiler: Option<Vec<String>>,

    /// Archiver command prefix
    pub archiver: Option<Vec<String>>,

    /// Linker command prefix
    pub linker: Option<Vec<String>>,

    /// Formatter command prefix
    pub formatter: Option<Vec<String>>,

    /// Make command used for Makefile escape hatches
    pub make: Option<Vec<String>>,

    /// Extension of compilation units (e.g. `.o`)
    pub unit_extension: Option<String>,

    /// Treat imports whose first element has no dot as toolchain-provided.
    /// Defaults to on for `gc`.
    pub implicit_std: Option<bool>,
}

/// Where installed artifacts go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InstallSettings {
    /// Root for installed libraries and directories
    pub lib_root: Option<PathBuf>,

    /// Directory for installed executables
    pub bin_dir: Option<PathBuf>,

    /// Root for remote package checkouts
    pub remote_root: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let t = other.toolchain;
        if t.kind.is_some() {
            self.toolchain.kind = t.kind;
        }
        if t.compiler.is_some() {
            self.toolchain.compiler = t.compiler;
        }
        if t.archiver.is_some() {
            self.toolchain.archiver = t.archiver;
        }
        if t.linker.is_some() {
            self.toolchain.linker = t.linker;
        }
        if t.formatter.is_some() {
            self.toolchain.formatter = t.formatter;
        }
        if t.make.is_some() {
            self.toolchain.make = t.make;
        }
        if t.unit_extension.is_some() {
            self.toolchain.unit_extension = t.unit_extension;
        }
        if t.implicit_std.is_some() {
            self.toolchain.implicit_std = t.implicit_std;
        }

        let i = other.install;
        if i.lib_root.is_some() {
            self.install.lib_root = i.lib_root;
        }
        if i.bin_dir.is_some() {
            self.install.bin_dir = i.bin_dir;
        }
        if i.remote_root.is_some() {
            self.install.remote_root = i.remote_root;
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.moor/config.toml)
/// 2. Global config (~/.moor/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global moor config directory (~/.moor).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".moor"))
}

/// Get the global config path (~/.moor/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.moor/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".moor").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(
            r#"
[toolchain]
kind = "gccgo"
compiler = ["gccgo"]
unit-extension = ".o"

[install]
bin-dir = "/opt/bin"
"#,
        )
        .unwrap();

        assert_eq!(config.toolchain.kind.as_deref(), Some("gccgo"));
        assert_eq!(config.toolchain.compiler, Some(vec!["gccgo".to_string()]));
        assert_eq!(config.install.bin_dir, Some(PathBuf::from("/opt/bin")));
        assert!(config.install.lib_root.is_none());
    }

    #[test]
    fn test_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");
        std::fs::write(
            &global,
            "[toolchain]\nkind = \"gc\"\nlinker = [\"ld\"]\n[install]\nlib-root = \"/g\"\n",
        )
        .unwrap();
        std::fs::write(&project, "[toolchain]\nkind = \"gccgo\"\n").unwrap();

        let config = load_config(&global, &project);
        assert_eq!(config.toolchain.kind.as_deref(), Some("gccgo"));
        assert_eq!(config.toolchain.linker, Some(vec!["ld".to_string()]));
        assert_eq!(config.install.lib_root, Some(PathBuf::from("/g")));
    }

    #[test]
    fn test_invalid_config_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[toolchain\n").unwrap();
        assert_eq!(Config::load_or_default(&path), Config::default());
    }
}
