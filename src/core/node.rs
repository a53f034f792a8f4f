//! Node types stored in the build graph arena.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::core::contents::SourceContents;
use crate::core::entry::Entry;
use crate::core::makefile::MakefileContents;

/// Index of a node inside [`BuildGraph`](crate::core::graph::BuildGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scheduler markers carried by every buildable node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildState {
    pub built: bool,
    pub now_building: bool,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub entry: Entry,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Dir(DirNode),
    Config,
    Makefile(MakefileNode),
    Source(SourceNode),
    TestSource(SourceNode),
    TestDriver(TestDriverNode),
    Unit(UnitNode),
    Library(LibraryNode),
    DynLibrary(DynLibraryNode),
    Executable(ExecutableNode),
}

impl NodeKind {
    /// Human readable kind, used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            NodeKind::Dir(_) => "directory",
            NodeKind::Config => "config file",
            NodeKind::Makefile(_) => "Makefile",
            NodeKind::Source(_) => "Go source file",
            NodeKind::TestSource(_) => "Go test file",
            NodeKind::TestDriver(_) => "generated test driver",
            NodeKind::Unit(_) => "compilation unit",
            NodeKind::Library(_) => "library",
            NodeKind::DynLibrary(_) => "dynamic library",
            NodeKind::Executable(_) => "executable",
        }
    }

    pub fn build_state(&self) -> Option<&BuildState> {
        match self {
            NodeKind::Makefile(m) => Some(&m.state),
            NodeKind::Unit(u) => Some(&u.state),
            NodeKind::Library(l) => Some(&l.state),
            NodeKind::Executable(e) => Some(&e.state),
            _ => None,
        }
    }

    pub fn build_state_mut(&mut self) -> Option<&mut BuildState> {
        match self {
            NodeKind::Makefile(m) => Some(&mut m.state),
            NodeKind::Unit(u) => Some(&mut u.state),
            NodeKind::Library(l) => Some(&mut l.state),
            NodeKind::Executable(e) => Some(&mut e.state),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirNode {
    pub children: BTreeMap<String, NodeId>,
    pub config: Option<NodeId>,
    pub makefile: Option<NodeId>,
    /// Target package declared by the directory's config file.
    pub package: Option<String>,
    /// Optional allowlist of package sources.
    pub sources: Option<BTreeSet<String>>,
    pub num_test_files: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SourceNode {
    pub contents: Option<Arc<SourceContents>>,
}

#[derive(Debug, Clone, Default)]
pub struct TestDriverNode {
    pub import_path: String,
    pub tests: BTreeSet<String>,
    pub benchmarks: BTreeSet<String>,
    pub contents: Option<Arc<SourceContents>>,
    /// Set whenever the test tables change; cleared once the file is in sync.
    pub stale: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UnitNode {
    pub sources: Vec<NodeId>,
    /// Import path of the package under test, for units compiled in test mode.
    pub test_import_path: Option<String>,
    pub state: BuildState,
}

#[derive(Debug, Clone, Default)]
pub struct LibraryNode {
    pub import_path: String,
    pub units: Vec<NodeId>,
    pub makefile: Option<NodeId>,
    pub part_of_test: bool,
    pub state: BuildState,
}

#[derive(Debug, Clone, Default)]
pub struct DynLibraryNode {
    pub import_path: String,
    pub makefile: Option<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutableNode {
    pub units: Vec<NodeId>,
    pub makefile: Option<NodeId>,
    /// Import path of the package under test, for test binaries.
    pub test_import_path: Option<String>,
    pub state: BuildState,
}

impl ExecutableNode {
    pub fn is_test(&self) -> bool {
        self.test_import_path.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MakefileNode {
    pub contents: Option<Arc<MakefileContents>>,
    /// Source nodes named by `GOFILES`.
    pub sources: Vec<NodeId>,
    pub library: Option<NodeId>,
    pub dyn_library: Option<NodeId>,
    pub executable: Option<NodeId>,
    pub state: BuildState,
}
