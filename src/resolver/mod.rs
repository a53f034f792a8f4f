//! Import path resolution.
//!
//! Two tables map import paths to the library that provides them: one for
//! ordinary builds and one for test builds. A test build of package `p`
//! compiles `p` together with its test files into a separate library, so
//! imports of `p` made while testing it resolve through the test table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::graph::BuildGraph;
use crate::core::node::NodeId;
use crate::core::LIB_EXT;

/// Imports that never name a library.
pub const BUILTIN_IMPORTS: &[&str] = &["C", "unsafe"];

/// What an import path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageResolution {
    pub library: NodeId,
    /// Directory passed to the compiler and linker as a search path.
    pub include_dir: NodeId,
    pub dyn_library: Option<NodeId>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("failed to resolve package \"{import_path}\"")]
    Unresolved { import_path: String },

    #[error("import path \"{import_path}\" maps to both \"{}\" and \"{}\"", .existing.display(), .new.display())]
    Conflict {
        import_path: String,
        existing: PathBuf,
        new: PathBuf,
    },
}

/// Everything outside the registry that resolution consults.
#[derive(Debug, Clone, Copy)]
pub struct ResolveEnv<'a> {
    /// Root under which installed libraries live.
    pub lib_root: &'a Path,
    /// The compiler finds imports itself; unresolved paths are deferred to it.
    pub toolchain_resolves_imports: bool,
    /// Imports whose first element has no dot belong to the toolchain.
    pub implicit_std: bool,
}

#[derive(Debug, Default)]
pub struct ImportRegistry {
    normal: BTreeMap<String, PackageResolution>,
    test: BTreeMap<String, PackageResolution>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, test: bool) -> &BTreeMap<String, PackageResolution> {
        if test {
            &self.test
        } else {
            &self.normal
        }
    }

    /// Register `import_path` in the chosen table.
    ///
    /// Registering the same library again is a no-op; a different library
    /// is a conflict.
    pub fn map_import_path(
        &mut self,
        graph: &BuildGraph,
        import_path: &str,
        resolution: PackageResolution,
        test: bool,
    ) -> Result<(), ResolveError> {
        let table = if test { &mut self.test } else { &mut self.normal };
        match table.get(import_path) {
            Some(existing) if existing.library == resolution.library => Ok(()),
            Some(existing) => Err(ResolveError::Conflict {
                import_path: import_path.to_string(),
                existing: graph.path(existing.library).to_path_buf(),
                new: graph.path(resolution.library).to_path_buf(),
            }),
            None => {
                tracing::debug!(
                    "map {}import \"{}\" -> {}",
                    if test { "test " } else { "" },
                    import_path,
                    graph.path(resolution.library).display()
                );
                table.insert(import_path.to_string(), resolution);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, import_path: &str, test: bool) -> Option<&PackageResolution> {
        self.table(test).get(import_path)
    }

    /// Ordinary mappings, sorted by import path.
    pub fn normal(&self) -> impl Iterator<Item = (&String, &PackageResolution)> {
        self.normal.iter()
    }

    /// Resolve an import.
    ///
    /// `Ok(None)` means the import is satisfied without a library from this
    /// project: a builtin, something the toolchain provides, or a library
    /// already installed under the install root.
    pub fn resolve(
        &self,
        import_path: &str,
        test: bool,
        env: ResolveEnv<'_>,
    ) -> Result<Option<PackageResolution>, ResolveError> {
        if let Some(resolution) = self.lookup(import_path, test) {
            return Ok(Some(*resolution));
        }

        if BUILTIN_IMPORTS.contains(&import_path) || env.toolchain_resolves_imports {
            return Ok(None);
        }

        if env.implicit_std && is_std_import(import_path) {
            return Ok(None);
        }

        if installed_library_path(env.lib_root, import_path).is_file() {
            return Ok(None);
        }

        Err(ResolveError::Unresolved {
            import_path: import_path.to_string(),
        })
    }
}

/// Where `import_path` lives once installed.
pub fn installed_library_path(lib_root: &Path, import_path: &str) -> PathBuf {
    lib_root.join(format!("{}{}", import_path, LIB_EXT))
}

fn is_std_import(import_path: &str) -> bool {
    let first = import_path.split('/').next().unwrap_or(import_path);
    !first.contains('.')
}
