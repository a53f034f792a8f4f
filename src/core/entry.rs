//! Filesystem entries backing graph nodes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};

/// A file or directory as last observed on disk.
///
/// `path` is relative to the project root; the root itself is `"."`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    name: String,
    path: PathBuf,
    exists: bool,
    mtime: Option<i64>,
}

impl Entry {
    /// Create an entry that has not been observed yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        Entry {
            name,
            path,
            exists: false,
            mtime: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Modification time in nanoseconds since the UNIX epoch.
    pub fn mtime(&self) -> Option<i64> {
        self.mtime
    }

    /// Absolute location of this entry under `root`.
    pub fn abs_path(&self, root: &Path) -> PathBuf {
        if self.path == Path::new(".") {
            root.to_path_buf()
        } else {
            root.join(&self.path)
        }
    }

    /// Re-stat the entry. A missing file is not an error.
    pub fn refresh(&mut self, root: &Path) -> Result<()> {
        let abs = self.abs_path(root);
        match fs::metadata(&abs) {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .with_context(|| format!("failed to read mtime: {}", abs.display()))?;
                let nanos = match modified.duration_since(UNIX_EPOCH) {
                    Ok(d) => d.as_nanos() as i64,
                    Err(e) => -(e.duration().as_nanos() as i64),
                };
                self.exists = true;
                self.mtime = Some(nanos);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.exists = false;
                self.mtime = None;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to stat {}", abs.display()));
            }
        }
        Ok(())
    }

    /// Whether this entry was modified strictly after `other`.
    pub fn is_newer_than(&self, other: &Entry) -> bool {
        self.mtime > other.mtime
    }
}

/// Join a root-relative directory path and a path relative to it.
pub fn join_rel(dir: &Path, rel: impl AsRef<Path>) -> PathBuf {
    if dir == Path::new(".") || dir.as_os_str().is_empty() {
        rel.as_ref().to_path_buf()
    } else {
        dir.join(rel)
    }
}
