//! Arena holding every node of a project's build graph.
//!
//! Nodes are addressed by [`NodeId`] and keyed by their root-relative path.
//! Creation is idempotent: asking for an existing node returns it, provided
//! it has the requested kind.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::core::contents::SourceContents;
use crate::core::entry::{join_rel, Entry};
use crate::core::errors::GraphError;
use crate::core::node::*;
use crate::core::{test_driver, TEST_DIR, TEST_DRIVER_NAME};

#[derive(Debug)]
pub struct BuildGraph {
    root: PathBuf,
    nodes: Vec<Node>,
    by_path: HashMap<PathBuf, NodeId>,
    new_objects: BTreeSet<NodeId>,
}

impl BuildGraph {
    /// Create a graph containing only the root directory at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut entry = Entry::new(".");
        entry.refresh(&root)?;
        let node = Node {
            entry,
            parent: None,
            kind: NodeKind::Dir(DirNode::default()),
        };
        let mut by_path = HashMap::new();
        by_path.insert(PathBuf::from("."), NodeId(0));
        Ok(BuildGraph {
            root,
            nodes: vec![node],
            by_path,
            new_objects: BTreeSet::new(),
        })
    }

    /// Absolute path of the project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn path(&self, id: NodeId) -> &Path {
        self.nodes[id.0].entry.path()
    }

    pub fn abs_path(&self, id: NodeId) -> PathBuf {
        self.nodes[id.0].entry.abs_path(&self.root)
    }

    pub fn entry(&self, id: NodeId) -> &Entry {
        &self.nodes[id.0].entry
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Find a node by its root-relative path.
    pub fn lookup(&self, path: &Path) -> Option<NodeId> {
        let path = if path.as_os_str().is_empty() {
            Path::new(".")
        } else {
            path
        };
        self.by_path.get(path).copied()
    }

    /// Find a node below `dir` by a relative path.
    pub fn lookup_in(&self, dir: NodeId, rel: &Path) -> Option<NodeId> {
        let mut current = dir;
        for component in rel.components() {
            let name = component.as_os_str().to_string_lossy();
            if name == "." {
                continue;
            }
            current = *self.dir(current)?.children.get(&*name)?;
        }
        Some(current)
    }

    pub fn dir(&self, id: NodeId) -> Option<&DirNode> {
        match &self.nodes[id.0].kind {
            NodeKind::Dir(d) => Some(d),
            _ => None,
        }
    }

    pub fn dir_mut(&mut self, id: NodeId) -> Option<&mut DirNode> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Dir(d) => Some(d),
            _ => None,
        }
    }

    /// Children of a directory, ordered by name. Empty for other kinds.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.dir(id)
            .map(|d| d.children.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn build_state(&self, id: NodeId) -> BuildState {
        self.nodes[id.0]
            .kind
            .build_state()
            .copied()
            .unwrap_or_default()
    }

    pub fn set_building(&mut self, id: NodeId, now_building: bool) {
        if let Some(state) = self.nodes[id.0].kind.build_state_mut() {
            state.now_building = now_building;
        }
    }

    pub fn set_built(&mut self, id: NodeId) {
        if let Some(state) = self.nodes[id.0].kind.build_state_mut() {
            state.built = true;
        }
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    /// Add a child node discovered on disk or inferred by the engine.
    ///
    /// The new node is stat'ed and queued for inference.
    pub fn add_child(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId> {
        let path = join_rel(self.path(parent), name);
        let mut entry = Entry::new(path.clone());
        entry.refresh(&self.root)?;

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            entry,
            parent: Some(parent),
            kind,
        });
        self.by_path.insert(path, id);
        if let Some(dir) = self.dir_mut(parent) {
            dir.children.insert(name.to_string(), id);
        }
        self.new_objects.insert(id);
        Ok(id)
    }

    fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.dir(parent).and_then(|d| d.children.get(name).copied())
    }

    fn mismatch(&self, id: NodeId, expected: &'static str) -> anyhow::Error {
        GraphError::KindMismatch {
            path: self.path(id).to_path_buf(),
            expected,
        }
        .into()
    }

    pub fn get_or_create_dir(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        match self.child(parent, name) {
            Some(id) if self.dir(id).is_some() => Ok(id),
            Some(id) => Err(self.mismatch(id, "directory")),
            None => self.add_child(parent, name, NodeKind::Dir(DirNode::default())),
        }
    }

    /// Create every directory along `rel`, starting at `parent`.
    pub fn get_or_create_dirs(&mut self, parent: NodeId, rel: &Path) -> Result<NodeId> {
        let mut current = parent;
        for component in rel.components() {
            let name = component.as_os_str().to_string_lossy().into_owned();
            if name == "." || name.is_empty() {
                continue;
            }
            current = self.get_or_create_dir(current, &name)?;
        }
        Ok(current)
    }

    pub fn get_or_create_unit(&mut self, dir: NodeId, name: &str) -> Result<NodeId> {
        match self.child(dir, name) {
            Some(id) => match self.nodes[id.0].kind {
                NodeKind::Unit(_) => Ok(id),
                _ => Err(self.mismatch(id, "compilation unit")),
            },
            None => self.add_child(dir, name, NodeKind::Unit(UnitNode::default())),
        }
    }

    pub fn get_or_create_library(
        &mut self,
        dir: NodeId,
        name: &str,
        import_path: &str,
    ) -> Result<NodeId> {
        let id = match self.child(dir, name) {
            Some(id) => match self.nodes[id.0].kind {
                NodeKind::Library(_) => id,
                _ => return Err(self.mismatch(id, "library")),
            },
            None => self.add_child(dir, name, NodeKind::Library(LibraryNode::default()))?,
        };
        if let NodeKind::Library(lib) = &mut self.nodes[id.0].kind {
            lib.import_path = import_path.to_string();
        }
        Ok(id)
    }

    pub fn get_or_create_dyn_library(
        &mut self,
        dir: NodeId,
        name: &str,
        import_path: &str,
    ) -> Result<NodeId> {
        let id = match self.child(dir, name) {
            Some(id) => match self.nodes[id.0].kind {
                NodeKind::DynLibrary(_) => id,
                _ => return Err(self.mismatch(id, "dynamic library")),
            },
            None => self.add_child(dir, name, NodeKind::DynLibrary(DynLibraryNode::default()))?,
        };
        if let NodeKind::DynLibrary(lib) = &mut self.nodes[id.0].kind {
            lib.import_path = import_path.to_string();
        }
        Ok(id)
    }

    pub fn get_or_create_executable(&mut self, dir: NodeId, name: &str) -> Result<NodeId> {
        match self.child(dir, name) {
            Some(id) => match self.nodes[id.0].kind {
                NodeKind::Executable(_) => Ok(id),
                _ => Err(self.mismatch(id, "executable")),
            },
            None => self.add_child(dir, name, NodeKind::Executable(ExecutableNode::default())),
        }
    }

    /// Get the test driver of `dir`, creating `_test/main.go` on first use.
    ///
    /// A driver left on disk by an earlier run was discovered as an ordinary
    /// source; it is converted in place.
    pub fn get_or_create_test_driver(&mut self, dir: NodeId, import_path: &str) -> Result<NodeId> {
        let test_dir = self.get_or_create_dir(dir, TEST_DIR)?;
        let id = match self.child(test_dir, TEST_DRIVER_NAME) {
            Some(id) => id,
            None => self.add_child(
                test_dir,
                TEST_DRIVER_NAME,
                NodeKind::TestDriver(TestDriverNode::default()),
            )?,
        };

        if matches!(self.nodes[id.0].kind, NodeKind::Source(_)) {
            self.nodes[id.0].kind = NodeKind::TestDriver(TestDriverNode {
                import_path: import_path.to_string(),
                stale: true,
                ..Default::default()
            });
            self.new_objects.insert(id);
        }

        match &mut self.nodes[id.0].kind {
            NodeKind::TestDriver(driver) => {
                if driver.import_path.is_empty() {
                    driver.import_path = import_path.to_string();
                    driver.stale = true;
                }
            }
            _ => return Err(self.mismatch(id, "generated test driver")),
        }
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Inference queue
    // ------------------------------------------------------------------

    /// Drain the set of nodes created since the last call.
    pub fn take_new_objects(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.new_objects).into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Filesystem model
    // ------------------------------------------------------------------

    /// Re-stat a single node.
    pub fn refresh(&mut self, id: NodeId) -> Result<()> {
        let root = self.root.clone();
        self.nodes[id.0].entry.refresh(&root)
    }

    /// Re-stat a node and, for directories, everything below it.
    pub fn refresh_tree(&mut self, id: NodeId) -> Result<()> {
        self.refresh(id)?;
        for child in self.children(id) {
            self.refresh_tree(child)?;
        }
        Ok(())
    }

    /// Create the directory `id` (and missing ancestors) on disk.
    pub fn mkdir_if_missing(&mut self, id: NodeId) -> Result<()> {
        if self.entry(id).exists() {
            return Ok(());
        }
        let abs = self.abs_path(id);
        tracing::debug!("mkdir {}", self.path(id).display());
        fs::create_dir_all(&abs)
            .with_context(|| format!("failed to create directory: {}", abs.display()))?;

        let mut current = Some(id);
        while let Some(dir) = current {
            if self.entry(dir).exists() {
                break;
            }
            self.refresh(dir)?;
            current = self.parent(dir);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Contents
    // ------------------------------------------------------------------

    /// Parsed contents of a source or test source, read on first use.
    pub fn source_contents(&mut self, id: NodeId) -> Result<Arc<SourceContents>> {
        let collect_tests = match &self.nodes[id.0].kind {
            NodeKind::Source(src) | NodeKind::TestSource(src) => {
                if let Some(contents) = &src.contents {
                    return Ok(Arc::clone(contents));
                }
                matches!(self.nodes[id.0].kind, NodeKind::TestSource(_))
            }
            NodeKind::TestDriver(_) => return self.driver_contents(id),
            _ => return Err(self.mismatch(id, "Go source file")),
        };

        let abs = self.abs_path(id);
        tracing::debug!("parse {}", self.path(id).display());
        let text = crate::util::fs::read_to_string(&abs)?;
        let contents = SourceContents::parse(&text, collect_tests).map_err(|message| {
            GraphError::Parse {
                path: self.path(id).to_path_buf(),
                message,
            }
        })?;
        let contents = Arc::new(contents);

        if let NodeKind::Source(src) | NodeKind::TestSource(src) = &mut self.nodes[id.0].kind {
            src.contents = Some(Arc::clone(&contents));
        }
        Ok(contents)
    }

    /// Bring the generated test driver in sync and return its contents.
    pub fn driver_contents(&mut self, id: NodeId) -> Result<Arc<SourceContents>> {
        let (text, import_path) = match &self.nodes[id.0].kind {
            NodeKind::TestDriver(driver) => {
                if let (false, Some(contents)) = (driver.stale, &driver.contents) {
                    return Ok(Arc::clone(contents));
                }
                (
                    test_driver::render(&driver.import_path, &driver.tests, &driver.benchmarks),
                    driver.import_path.clone(),
                )
            }
            _ => return Err(self.mismatch(id, "generated test driver")),
        };

        let abs = self.abs_path(id);
        if test_driver::write_if_changed(&abs, &text)? {
            if let Some(parent) = self.parent(id) {
                self.refresh(parent)?;
            }
            self.refresh(id)?;
        }

        let contents = SourceContents::parse(&text, false).map_err(|message| GraphError::Parse {
            path: self.path(id).to_path_buf(),
            message: format!("{} (driver for \"{}\")", message, import_path),
        })?;
        let contents = Arc::new(contents);

        if let NodeKind::TestDriver(driver) = &mut self.nodes[id.0].kind {
            driver.contents = Some(Arc::clone(&contents));
            driver.stale = false;
        }
        Ok(contents)
    }
}
