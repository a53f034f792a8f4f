//! The incremental build scheduler.
//!
//! Every buildable node is made by a recursive, memoized walk: prerequisites
//! first, then the node itself when it is missing or older than something it
//! was built from. A node's modification time is captured before its
//! prerequisites are made, so freshly rebuilt prerequisites count as newer.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::Result;

use crate::builder::context::BuildContext;
use crate::builder::makefile;
use crate::builder::toolchain::{ArchiveInput, CompileInput, LinkInput};
use crate::core::entry::Entry;
use crate::core::errors::GraphError;
use crate::core::node::*;
use crate::core::TEST_DIR;
use crate::resolver::PackageResolution;
use crate::util::fs::{ensure_dir, remove_file_if_exists};

/// Make `id` and everything below it, skipping test binaries.
pub fn make(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    match &ctx.graph.node(id).kind {
        NodeKind::Dir(_) => make_dir(ctx, id),
        NodeKind::Unit(_) => make_unit(ctx, id),
        NodeKind::Library(_) => make_library(ctx, id),
        NodeKind::DynLibrary(_) => make_dyn_library(ctx, id),
        NodeKind::Executable(exe) if !exe.is_test() => make_executable(ctx, id),
        _ => Ok(()),
    }
}

/// Make the test binaries below `id`.
pub fn make_tests(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    match &ctx.graph.node(id).kind {
        NodeKind::Dir(dir) => {
            let makefile = dir.makefile;
            let has_tests = dir.num_test_files > 0;
            match makefile {
                Some(m) if has_tests => makefile::make_tests(ctx, m),
                Some(_) => Ok(()),
                None => {
                    for child in ctx.graph.children(id) {
                        make_tests(ctx, child)?;
                    }
                    Ok(())
                }
            }
        }
        NodeKind::Executable(exe) if exe.is_test() => make_executable(ctx, id),
        _ => Ok(()),
    }
}

fn make_dir(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    if ctx.graph.entry(id).name() == TEST_DIR {
        return Ok(());
    }
    ctx.graph.mkdir_if_missing(id)?;

    if let Some(m) = ctx.graph.dir(id).and_then(|d| d.makefile) {
        return makefile::make(ctx, m);
    }
    for child in ctx.graph.children(id) {
        make(ctx, child)?;
    }
    Ok(())
}

/// Resolve `imports` and make the libraries they name.
///
/// An import equal to `test_import_path` resolves to the test build of
/// that package.
pub fn make_prerequisites(
    ctx: &mut BuildContext,
    imports: &[String],
    test_import_path: Option<&str>,
) -> Result<Vec<PackageResolution>> {
    let mut packages = Vec::with_capacity(imports.len());
    for import in imports {
        let test = test_import_path == Some(import.as_str());
        if let Some(pkg) = ctx.resolve(import, test)? {
            make_library(ctx, pkg.library)?;
            packages.push(pkg);
        }
    }
    Ok(packages)
}

pub fn make_unit(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    if ctx.graph.build_state(id).built {
        return Ok(());
    }

    ctx.with_building(id, |ctx| {
        let (sources, test_import_path) = match &ctx.graph.node(id).kind {
            NodeKind::Unit(unit) => (unit.sources.clone(), unit.test_import_path.clone()),
            _ => return Err(kind_mismatch(ctx, id, "compilation unit")),
        };
        if sources.is_empty() && ctx.graph.entry(id).exists() {
            ctx.graph.set_built(id);
            return Ok(());
        }

        let before = ctx.graph.entry(id).clone();
        let mut rebuild = !before.exists();
        let mut include_dirs = BTreeSet::new();
        let mut missing = Vec::new();

        for &src in &sources {
            if matches!(ctx.graph.node(src).kind, NodeKind::TestDriver(_)) {
                ctx.graph.driver_contents(src)?;
            }
            if !ctx.graph.entry(src).exists() {
                missing.push(ctx.graph.path(src).display().to_string());
                continue;
            }
            if ctx.graph.entry(src).is_newer_than(&before) {
                rebuild = true;
            }

            let contents = ctx.graph.source_contents(src)?;
            let packages = make_prerequisites(ctx, &contents.imports, test_import_path.as_deref())?;
            for pkg in packages {
                include_dirs.insert(ctx.graph.path(pkg.include_dir).to_path_buf());
                rebuild |= is_newer(ctx, pkg.library, &before);
                if let Some(dyn_lib) = pkg.dyn_library {
                    rebuild |= is_newer(ctx, dyn_lib, &before);
                }
            }
        }

        if !missing.is_empty() {
            return Err(GraphError::MissingSources {
                path: ctx.graph.path(id).to_path_buf(),
                missing,
            }
            .into());
        }

        if rebuild {
            mkdir_parent(ctx, id)?;
            let spec = ctx.toolchain.compile_command(&CompileInput {
                output: ctx.graph.path(id).to_path_buf(),
                include_dirs: include_dirs.into_iter().collect(),
                sources: paths(ctx, &sources),
            });
            ctx.run_tool(spec)?;
            ensure_produced(ctx, id)?;
        }

        ctx.graph.set_built(id);
        Ok(())
    })
}

pub fn make_library(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    if ctx.graph.build_state(id).built {
        return Ok(());
    }

    ctx.with_building(id, |ctx| {
        let (units, makefile) = match &ctx.graph.node(id).kind {
            NodeKind::Library(lib) => (lib.units.clone(), lib.makefile),
            _ => return Err(kind_mismatch(ctx, id, "library")),
        };

        let before = ctx.graph.entry(id).clone();
        let mut rebuild = !before.exists();
        for &unit in &units {
            make_unit(ctx, unit)?;
            rebuild |= is_newer(ctx, unit, &before);
        }

        if rebuild {
            match makefile {
                Some(m) => {
                    makefile::make(ctx, m)?;
                    ensure_produced(ctx, id)?;
                }
                None if units.is_empty() => {
                    return Err(GraphError::NoRecipe {
                        path: ctx.graph.path(id).to_path_buf(),
                    }
                    .into());
                }
                None => {
                    mkdir_parent(ctx, id)?;
                    if before.exists() {
                        tracing::debug!("remove {}", ctx.graph.path(id).display());
                        remove_file_if_exists(&ctx.graph.abs_path(id))?;
                    }
                    let spec = ctx.toolchain.archive_command(&ArchiveInput {
                        output: ctx.graph.path(id).to_path_buf(),
                        units: paths(ctx, &units),
                    });
                    ctx.run_tool(spec)?;
                    ensure_produced(ctx, id)?;
                }
            }
        }

        ctx.graph.set_built(id);
        Ok(())
    })
}

pub fn make_dyn_library(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    if ctx.graph.entry(id).exists() {
        return Ok(());
    }
    match &ctx.graph.node(id).kind {
        NodeKind::DynLibrary(DynLibraryNode {
            makefile: Some(m), ..
        }) => {
            let m = *m;
            makefile::make(ctx, m)?;
            ensure_produced(ctx, id)
        }
        _ => Err(GraphError::NoRecipe {
            path: ctx.graph.path(id).to_path_buf(),
        }
        .into()),
    }
}

/// Libraries an executable links against, found by following imports.
#[derive(Debug, Default)]
pub struct LinkSet {
    pub include_dirs: BTreeSet<PathBuf>,
    pub libs: BTreeSet<NodeId>,
    pub dyn_libs: BTreeSet<NodeId>,
}

/// Follow imports from the executable's own sources through every library
/// they reach, until no new import paths turn up.
pub fn collect_libs(ctx: &mut BuildContext, exe: NodeId) -> Result<LinkSet> {
    let (units, test_import_path) = match &ctx.graph.node(exe).kind {
        NodeKind::Executable(e) => (e.units.clone(), e.test_import_path.clone()),
        _ => return Err(kind_mismatch(ctx, exe, "executable")),
    };

    let mut resolved: BTreeMap<String, Option<PackageResolution>> = BTreeMap::new();
    let mut todo = BTreeSet::new();
    for unit in units {
        for import in unit_imports(ctx, unit)? {
            todo.insert(import);
        }
    }

    while !todo.is_empty() {
        let mut next = BTreeSet::new();
        for import in &todo {
            let test = test_import_path.as_deref() == Some(import.as_str());
            let pkg = ctx.resolve(import, test)?;
            resolved.insert(import.clone(), pkg);

            let Some(pkg) = pkg else { continue };
            for dep in library_imports(ctx, pkg.library)? {
                if !resolved.contains_key(&dep) && !todo.contains(&dep) {
                    next.insert(dep);
                }
            }
        }
        todo = next;
    }

    let mut set = LinkSet::default();
    for pkg in resolved.into_values().flatten() {
        set.include_dirs
            .insert(ctx.graph.path(pkg.include_dir).to_path_buf());
        set.libs.insert(pkg.library);
        if let Some(dyn_lib) = pkg.dyn_library {
            set.dyn_libs.insert(dyn_lib);
        }
    }
    Ok(set)
}

fn unit_imports(ctx: &mut BuildContext, unit: NodeId) -> Result<Vec<String>> {
    let sources = match &ctx.graph.node(unit).kind {
        NodeKind::Unit(u) => u.sources.clone(),
        _ => Vec::new(),
    };
    sources_imports(ctx, &sources)
}

fn library_imports(ctx: &mut BuildContext, lib: NodeId) -> Result<Vec<String>> {
    let (units, makefile) = match &ctx.graph.node(lib).kind {
        NodeKind::Library(l) => (l.units.clone(), l.makefile),
        _ => return Ok(Vec::new()),
    };
    let mut imports = Vec::new();
    for unit in units {
        imports.extend(unit_imports(ctx, unit)?);
    }
    if let Some(m) = makefile {
        let sources = match &ctx.graph.node(m).kind {
            NodeKind::Makefile(mk) => mk.sources.clone(),
            _ => Vec::new(),
        };
        imports.extend(sources_imports(ctx, &sources)?);
    }
    Ok(imports)
}

fn sources_imports(ctx: &mut BuildContext, sources: &[NodeId]) -> Result<Vec<String>> {
    let mut imports = Vec::new();
    for &src in sources {
        let contents = ctx.graph.source_contents(src)?;
        imports.extend(contents.imports.iter().cloned());
    }
    Ok(imports)
}

/// Build the executable at its own path.
pub fn make_executable(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    if ctx.graph.build_state(id).built {
        return Ok(());
    }
    link_executable(ctx, id, false)
}

/// Link the executable straight into the install directory.
pub fn install_executable(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    link_executable(ctx, id, true)
}

fn link_executable(ctx: &mut BuildContext, id: NodeId, install: bool) -> Result<()> {
    ctx.with_building(id, |ctx| {
        let (units, makefile) = match &ctx.graph.node(id).kind {
            NodeKind::Executable(exe) => (exe.units.clone(), exe.makefile),
            _ => return Err(kind_mismatch(ctx, id, "executable")),
        };
        let link = collect_libs(ctx, id)?;

        let before = ctx.graph.entry(id).clone();
        let mut rebuild = !before.exists();
        for &unit in &units {
            make_unit(ctx, unit)?;
            rebuild |= is_newer(ctx, unit, &before);
        }
        for &lib in &link.libs {
            make_library(ctx, lib)?;
            rebuild |= is_newer(ctx, lib, &before);
        }
        for &dyn_lib in &link.dyn_libs {
            make_dyn_library(ctx, dyn_lib)?;
            rebuild |= is_newer(ctx, dyn_lib, &before);
        }

        if rebuild || install {
            match makefile {
                Some(m) => {
                    makefile::make(ctx, m)?;
                    if install {
                        makefile::make_install(ctx, m)?;
                    }
                    ensure_produced(ctx, id)?;
                }
                None if units.is_empty() => {
                    return Err(GraphError::NoRecipe {
                        path: ctx.graph.path(id).to_path_buf(),
                    }
                    .into());
                }
                None => {
                    let output = if install {
                        ensure_dir(&ctx.paths.bin_dir)?;
                        ctx.paths.bin_dir.join(ctx.graph.entry(id).name())
                    } else {
                        mkdir_parent(ctx, id)?;
                        ctx.graph.path(id).to_path_buf()
                    };
                    let rpath = rpath(ctx, &link.dyn_libs, install);
                    let spec = ctx.toolchain.link_command(&LinkInput {
                        output,
                        lib_dirs: link.include_dirs.iter().cloned().collect(),
                        libs: link.libs.iter().map(|&l| ctx.graph.path(l).to_path_buf()).collect(),
                        rpath,
                        units: paths(ctx, &units),
                    });
                    ctx.run_tool(spec)?;

                    if install {
                        for &dyn_lib in &link.dyn_libs {
                            install_dyn_library(ctx, dyn_lib)?;
                        }
                    } else {
                        ensure_produced(ctx, id)?;
                    }
                }
            }
        }

        if !install {
            ctx.graph.set_built(id);
        }
        Ok(())
    })
}

/// Runtime search path for the dynamic libraries an executable needs.
fn rpath(ctx: &BuildContext, dyn_libs: &BTreeSet<NodeId>, install: bool) -> Option<String> {
    if dyn_libs.is_empty() {
        return None;
    }
    let mut dirs: Vec<String> = Vec::new();
    if !install {
        for &dyn_lib in dyn_libs {
            if let Some(parent) = ctx.graph.parent(dyn_lib) {
                dirs.push(ctx.graph.abs_path(parent).display().to_string());
            }
        }
    }
    dirs.push(ctx.paths.lib_root.display().to_string());
    Some(dirs.join(":"))
}

/// Copy a dynamic library next to the installed libraries.
pub fn install_dyn_library(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    make_dyn_library(ctx, id)?;
    let dst = ctx.paths.lib_root.join(ctx.graph.entry(id).name());
    tracing::debug!("install {}", dst.display());
    crate::util::fs::copy_file(&ctx.graph.abs_path(id), &dst)
}

fn is_newer(ctx: &BuildContext, id: NodeId, than: &Entry) -> bool {
    ctx.graph.entry(id).is_newer_than(than)
}

fn paths(ctx: &BuildContext, ids: &[NodeId]) -> Vec<PathBuf> {
    ids.iter().map(|&id| ctx.graph.path(id).to_path_buf()).collect()
}

fn mkdir_parent(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    match ctx.graph.parent(id) {
        Some(parent) => ctx.graph.mkdir_if_missing(parent),
        None => Ok(()),
    }
}

/// Re-stat `id` after a tool ran and fail if it is still missing.
fn ensure_produced(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    ctx.graph.refresh(id)?;
    if !ctx.graph.entry(id).exists() {
        return Err(GraphError::ArtifactMissing {
            path: ctx.graph.path(id).to_path_buf(),
        }
        .into());
    }
    Ok(())
}

fn kind_mismatch(ctx: &BuildContext, id: NodeId, expected: &'static str) -> anyhow::Error {
    GraphError::KindMismatch {
        path: ctx.graph.path(id).to_path_buf(),
        expected,
    }
    .into()
}
