//! Global context for Moor operations.
//!
//! Provides centralized access to configuration, paths, and environment.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::util::config::{self, Config};

/// Overrides the library install root.
pub const PKG_ROOT_ENV: &str = "MOOR_PKG_ROOT";

/// Overrides the executable install directory.
pub const BIN_DIR_ENV: &str = "MOOR_BIN";

/// Overrides the remote package checkout root.
pub const SRC_ROOT_ENV: &str = "MOOR_SRC_ROOT";

/// Project directories for Moor
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("com", "moor", "moor"));

/// Resolved install locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    /// Installed libraries live at `<lib_root>/<import path>.a`.
    pub lib_root: PathBuf,
    pub bin_dir: PathBuf,
    pub remote_root: PathBuf,
}

impl InstallPaths {
    /// All three locations below `base`.
    pub fn under(base: &Path) -> Self {
        InstallPaths {
            lib_root: base.join("pkg"),
            bin_dir: base.join("bin"),
            remote_root: base.join("src"),
        }
    }
}

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory; the project root.
    cwd: PathBuf,

    /// Home directory for global Moor data
    home: PathBuf,

    /// Whether to use verbose output
    verbose: bool,

    /// Merged global and project configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext rooted at the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let home = if let Some(dir) = config::global_config_dir() {
            dir
        } else if let Some(dirs) = PROJECT_DIRS.as_ref() {
            dirs.data_dir().to_path_buf()
        } else {
            PathBuf::from(".moor")
        };

        let global = config::global_config_path().unwrap_or_else(|| home.join("config.toml"));
        let config = config::load_config(&global, &config::project_config_path(&cwd));

        Ok(GlobalContext {
            cwd,
            home,
            verbose: false,
            config,
        })
    }

    /// Replace the loaded configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Resolve install locations: environment, then config, then home.
    pub fn install_paths(&self) -> InstallPaths {
        let defaults = InstallPaths::under(&self.home);
        let pick = |env: &str, configured: &Option<PathBuf>, default: PathBuf| {
            std::env::var_os(env)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .or_else(|| configured.clone())
                .unwrap_or(default)
        };
        let install = &self.config.install;
        InstallPaths {
            lib_root: pick(PKG_ROOT_ENV, &install.lib_root, defaults.lib_root),
            bin_dir: pick(BIN_DIR_ENV, &install.bin_dir, defaults.bin_dir),
            remote_root: pick(SRC_ROOT_ENV, &install.remote_root, defaults.remote_root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::config::InstallSettings;
    use tempfile::TempDir;

    #[test]
    fn test_with_cwd() {
        let tmp = TempDir::new().unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        assert_eq!(ctx.cwd(), tmp.path());
        assert!(!ctx.is_verbose());
    }

    #[test]
    fn test_project_config_is_loaded() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".moor")).unwrap();
        std::fs::write(
            tmp.path().join(".moor/config.toml"),
            "[toolchain]\nkind = \"gccgo\"\n",
        )
        .unwrap();
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        assert_eq!(ctx.config().toolchain.kind.as_deref(), Some("gccgo"));
    }

    #[test]
    fn test_configured_install_paths() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            install: InstallSettings {
                remote_root: Some(PathBuf::from("/opt/src")),
                ..Default::default()
            },
            ..Default::default()
        };
        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf())
            .unwrap()
            .with_config(config);
        let paths = ctx.install_paths();
        if std::env::var_os(SRC_ROOT_ENV).is_none() {
            assert_eq!(paths.remote_root, PathBuf::from("/opt/src"));
        }
    }
}
