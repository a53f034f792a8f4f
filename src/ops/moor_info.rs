//! Implementation of `moor info`.

use std::fmt::Write;

use anyhow::Result;
use serde::Serialize;

use crate::builder::BuildContext;
use crate::core::node::{NodeId, NodeKind};

/// What the project builds, sorted by path.
#[derive(Debug, Default, Serialize)]
pub struct Inventory {
    pub libraries: Vec<Product>,
    pub dynamic_libraries: Vec<Product>,
    pub executables: Vec<Product>,
    pub tests: Vec<Product>,
    pub remote_dependencies: Vec<RemoteDependency>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub path: String,
    /// Built by a Makefile escape hatch.
    pub makefile: bool,
    /// Contributing sources, sorted.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteDependency {
    pub repository: String,
    pub kind: String,
    pub imports: Vec<String>,
}

impl Inventory {
    /// Gather every product of the inferred graph.
    pub fn collect(ctx: &BuildContext) -> Inventory {
        let mut inventory = Inventory::default();

        for id in ctx.graph.ids() {
            match &ctx.graph.node(id).kind {
                NodeKind::Library(lib) if !lib.part_of_test => {
                    if !lib.units.is_empty() || lib.makefile.is_some() {
                        inventory
                            .libraries
                            .push(product(ctx, id, &lib.units, lib.makefile));
                    }
                }
                NodeKind::DynLibrary(dyn_lib) if dyn_lib.makefile.is_some() => {
                    inventory
                        .dynamic_libraries
                        .push(product(ctx, id, &[], dyn_lib.makefile));
                }
                NodeKind::Executable(exe) if exe.is_test() => {
                    let mut test = product(ctx, id, &[], exe.makefile);
                    test.sources.clear();
                    inventory.tests.push(test);
                }
                NodeKind::Executable(exe) => {
                    if !exe.units.is_empty() || exe.makefile.is_some() {
                        inventory
                            .executables
                            .push(product(ctx, id, &exe.units, exe.makefile));
                    }
                }
                _ => {}
            }
        }

        for remote in ctx.workspace.remotes() {
            let mut imports = remote.import_paths.clone();
            imports.sort();
            inventory.remote_dependencies.push(RemoteDependency {
                repository: remote.repository.path().to_string(),
                kind: remote.repository.kind().to_string(),
                imports,
            });
        }

        for list in [
            &mut inventory.libraries,
            &mut inventory.dynamic_libraries,
            &mut inventory.executables,
            &mut inventory.tests,
        ] {
            list.sort_by(|a, b| a.path.cmp(&b.path));
        }
        inventory
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
            && self.dynamic_libraries.is_empty()
            && self.executables.is_empty()
            && self.tests.is_empty()
            && self.remote_dependencies.is_empty()
    }

    /// Human-oriented listing; `verbose` adds sources and remote imports.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();
        render_section(&mut out, "Libraries", &self.libraries, verbose);
        render_section(&mut out, "Dynamic libraries", &self.dynamic_libraries, verbose);
        render_section(&mut out, "Executables", &self.executables, verbose);
        render_section(&mut out, "Tests", &self.tests, false);

        if !self.remote_dependencies.is_empty() {
            start_section(&mut out, "Remote dependencies");
            for remote in &self.remote_dependencies {
                let _ = writeln!(out, "    {}  @{}", remote.repository, remote.kind);
                if verbose {
                    for import in &remote.imports {
                        let _ = writeln!(out, "        {}", import);
                    }
                }
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn product(ctx: &BuildContext, id: NodeId, units: &[NodeId], makefile: Option<NodeId>) -> Product {
    let mut sources = Vec::new();
    for &unit in units {
        if let NodeKind::Unit(u) = &ctx.graph.node(unit).kind {
            sources.extend(u.sources.iter().map(|&s| ctx.graph.path(s).display().to_string()));
        }
    }
    if let Some(m) = makefile {
        if let NodeKind::Makefile(mk) = &ctx.graph.node(m).kind {
            sources.extend(mk.sources.iter().map(|&s| ctx.graph.path(s).display().to_string()));
        }
    }
    sources.sort();
    sources.dedup();

    Product {
        path: ctx.graph.path(id).display().to_string(),
        makefile: makefile.is_some(),
        sources,
    }
}

fn start_section(out: &mut String, title: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(out, "{}:", title);
}

fn render_section(out: &mut String, title: &str, products: &[Product], verbose: bool) {
    if products.is_empty() {
        return;
    }
    start_section(out, title);
    for p in products {
        let suffix = if p.makefile { " (Makefile)" } else { "" };
        let _ = writeln!(out, "    {}{}", p.path, suffix);
        if verbose {
            for src in &p.sources {
                let _ = writeln!(out, "        {}", src);
            }
        }
    }
}
