//! Build context - the graph, the facts it was inferred from, and the tools.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::toolchain::{CommandSpec, Toolchain};
use crate::core::errors::GraphError;
use crate::core::graph::BuildGraph;
use crate::core::node::NodeId;
use crate::core::Workspace;
use crate::resolver::{ImportRegistry, PackageResolution, ResolveEnv};
use crate::util::context::InstallPaths;
use crate::util::process::CommandRunner;

/// Everything a single command invocation works on.
///
/// Constructed fresh per command; nothing here outlives it.
pub struct BuildContext {
    /// Object graph of the project
    pub graph: BuildGraph,

    /// Import path tables filled during inference
    pub registry: ImportRegistry,

    /// Facts from every `moor.toml` in the tree
    pub workspace: Workspace,

    /// Toolchain implementation
    pub toolchain: Box<dyn Toolchain>,

    /// Runs external tools
    pub runner: Box<dyn CommandRunner>,

    /// Install locations
    pub paths: InstallPaths,

    /// Whether to use verbose output
    pub verbose: bool,
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("root", &self.graph.root())
            .field("nodes", &self.graph.len())
            .field("toolchain", &self.toolchain.kind())
            .field("paths", &self.paths)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl BuildContext {
    /// Create a context for the project at `root`, containing only the root node.
    pub fn new(
        root: impl Into<PathBuf>,
        toolchain: Box<dyn Toolchain>,
        runner: Box<dyn CommandRunner>,
        paths: InstallPaths,
    ) -> Result<Self> {
        Ok(BuildContext {
            graph: BuildGraph::new(root)?,
            registry: ImportRegistry::new(),
            workspace: Workspace::new(),
            toolchain,
            runner,
            paths,
            verbose: false,
        })
    }

    pub fn root(&self) -> &Path {
        self.graph.root()
    }

    pub fn resolve_env(&self) -> ResolveEnv<'_> {
        ResolveEnv {
            lib_root: &self.paths.lib_root,
            toolchain_resolves_imports: self.toolchain.resolves_imports(),
            implicit_std: self.toolchain.implicit_std(),
        }
    }

    /// Resolve an import against the registry and the install root.
    pub fn resolve(&self, import_path: &str, test: bool) -> Result<Option<PackageResolution>> {
        Ok(self
            .registry
            .resolve(import_path, test, self.resolve_env())?)
    }

    /// Run a tool from the project root.
    pub fn run_tool(&mut self, spec: CommandSpec) -> Result<()> {
        let cmd = spec.into_process().cwd(self.graph.root());
        self.runner.run(&cmd)
    }

    /// Run a tool in the directory `dir`.
    pub fn run_tool_in(&mut self, spec: CommandSpec, dir: NodeId) -> Result<()> {
        let cmd = spec.into_process().cwd(self.graph.abs_path(dir));
        self.runner.run(&cmd)
    }

    /// Mark `id` as building for the duration of `f`.
    ///
    /// Re-entering a node that is already building is a circular
    /// dependency. The marker is cleared on every exit path.
    pub fn with_building<T>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.graph.build_state(id).now_building {
            return Err(GraphError::CircularDependency {
                path: self.graph.path(id).to_path_buf(),
            }
            .into());
        }
        self.graph.set_building(id, true);
        let result = f(self);
        self.graph.set_building(id, false);
        result
    }
}
