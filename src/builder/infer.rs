//! Inference: turning discovered files into compilation units, libraries
//! and executables.
//!
//! Inferring a node may create new nodes (a test source creates the test
//! driver, which in turn needs a unit and a test binary), so inference runs
//! in rounds until a round creates nothing new.

use std::path::Path;

use anyhow::{Context, Result};

use crate::builder::context::BuildContext;
use crate::builder::makefile;
use crate::core::errors::{ConfigError, GraphError};
use crate::core::makefile::MakefileKind;
use crate::core::node::*;
use crate::core::{
    CONFIG_FILE_NAME, DEFAULT_EXE_NAME, ENTRY_PACKAGE, LIB_EXT, OBJ_DIR, SOURCE_EXT, TEST_DIR,
    TEST_DRIVER_NAME, TEST_EXE_NAME,
};
use crate::resolver::PackageResolution;

/// Infer every object reachable from the files discovered so far.
///
/// With `update_tests`, generated test drivers are written to disk once
/// every test source has contributed its test names.
pub fn infer_all(ctx: &mut BuildContext, update_tests: bool) -> Result<()> {
    let mut round = 0;
    loop {
        let new_objects = ctx.graph.take_new_objects();
        if new_objects.is_empty() {
            break;
        }
        round += 1;
        tracing::debug!("inference round {}: {} new objects", round, new_objects.len());
        for id in new_objects {
            infer_object(ctx, id)?;
        }
    }

    if update_tests {
        let drivers: Vec<NodeId> = ctx
            .graph
            .ids()
            .filter(|&id| matches!(ctx.graph.node(id).kind, NodeKind::TestDriver(_)))
            .collect();
        for id in drivers {
            ctx.graph.driver_contents(id)?;
        }
    }

    check_executable_mappings(ctx)?;
    check_remote_packages(ctx)
}

fn infer_object(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    match &ctx.graph.node(id).kind {
        NodeKind::Source(_) => {
            infer_source(ctx, id, false)?;
            let has_tests = ctx
                .graph
                .parent(id)
                .and_then(|p| ctx.graph.dir(p))
                .is_some_and(|d| d.num_test_files > 0);
            if has_tests {
                infer_source(ctx, id, true)?;
            }
            Ok(())
        }
        NodeKind::TestSource(_) => infer_source(ctx, id, true),
        NodeKind::TestDriver(_) => infer_test_driver(ctx, id),
        NodeKind::Makefile(_) => infer_makefile(ctx, id),
        _ => Ok(()),
    }
}

fn is_generated_driver(path: &Path) -> bool {
    path.file_name().is_some_and(|n| n == TEST_DRIVER_NAME)
        && path
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|n| n == TEST_DIR)
}

/// Place one source or test source into the object graph.
fn infer_source(ctx: &mut BuildContext, id: NodeId, test: bool) -> Result<()> {
    if is_generated_driver(ctx.graph.path(id)) {
        return Ok(());
    }
    let Some(dir) = ctx.graph.parent(id) else {
        return Ok(());
    };

    let is_ordinary = matches!(ctx.graph.node(id).kind, NodeKind::Source(_));
    if is_ordinary {
        if let Some(allowed) = ctx.graph.dir(dir).and_then(|d| d.sources.as_ref()) {
            if !allowed.contains(ctx.graph.entry(id).name()) {
                tracing::debug!("not a package source: {}", ctx.graph.path(id).display());
                return Ok(());
            }
        }
    }

    let contents = ctx.graph.source_contents(id)?;
    if test && contents.package == ENTRY_PACKAGE {
        return Err(GraphError::TestOfEntryPackage {
            dir: ctx.graph.path(dir).to_path_buf(),
        }
        .into());
    }

    let (target, has_makefile) = match ctx.graph.dir(dir) {
        Some(d) => (d.package.clone(), d.makefile.is_some()),
        None => (None, false),
    };
    if has_makefile {
        return Ok(());
    }

    let obj_dir = ctx
        .graph
        .get_or_create_dir(dir, if test { TEST_DIR } else { OBJ_DIR })?;
    let ext = ctx.toolchain.unit_extension().to_string();
    let mapping = ctx
        .workspace
        .executable_for(ctx.graph.path(id))
        .map(Path::to_path_buf);

    let unit_name = if contents.package != ENTRY_PACKAGE {
        format!("{}{}", contents.package, ext)
    } else {
        match mapping.as_deref().and_then(Path::file_name) {
            Some(exe) => format!("{}{}", exe.to_string_lossy(), ext),
            None => format!("{}{}", ENTRY_PACKAGE, ext),
        }
    };
    let unit = ctx.graph.get_or_create_unit(obj_dir, &unit_name)?;
    add_unit_source(ctx, unit, id);

    if contents.package != ENTRY_PACKAGE {
        let Some(target) = target else {
            return Err(GraphError::MissingTargetPackage {
                dir: ctx.graph.path(dir).to_path_buf(),
                config: CONFIG_FILE_NAME,
            }
            .into());
        };

        let lib = library_for(ctx, obj_dir, &target)?;
        add_library_unit(ctx, lib, unit);
        ctx.registry.map_import_path(
            &ctx.graph,
            &target,
            PackageResolution {
                library: lib,
                include_dir: obj_dir,
                dyn_library: None,
            },
            test,
        )?;

        if test {
            if let NodeKind::Library(l) = &mut ctx.graph.node_mut(lib).kind {
                l.part_of_test = true;
            }
            let driver = ctx.graph.get_or_create_test_driver(dir, &target)?;
            if let NodeKind::TestDriver(d) = &mut ctx.graph.node_mut(driver).kind {
                let before = d.tests.len() + d.benchmarks.len();
                d.tests.extend(contents.tests.iter().cloned());
                d.benchmarks.extend(contents.benchmarks.iter().cloned());
                if d.tests.len() + d.benchmarks.len() != before {
                    d.stale = true;
                }
            }
        }
    } else {
        let exe = match mapping {
            Some(path) => {
                let root = ctx.graph.root_id();
                let exe_dir = match path.parent() {
                    Some(parent) => ctx.graph.get_or_create_dirs(root, parent)?,
                    None => root,
                };
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .with_context(|| format!("invalid executable path: {}", path.display()))?;
                ctx.graph.get_or_create_executable(exe_dir, &name)?
            }
            None => ctx.graph.get_or_create_executable(dir, DEFAULT_EXE_NAME)?,
        };
        add_executable_unit(ctx, exe, unit);
    }
    Ok(())
}

/// `<obj dir>/<import dir>/<base>.a` for the package `target`.
fn library_for(ctx: &mut BuildContext, obj_dir: NodeId, target: &str) -> Result<NodeId> {
    let (import_dir, base) = match target.rsplit_once('/') {
        Some((dir, base)) => (dir, base),
        None => ("", target),
    };
    let lib_dir = ctx.graph.get_or_create_dirs(obj_dir, Path::new(import_dir))?;
    ctx.graph
        .get_or_create_library(lib_dir, &format!("{}{}", base, LIB_EXT), target)
}

/// The driver gets its own unit in `_test` and a test binary next to the
/// package it tests.
fn infer_test_driver(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    let import_path = match &ctx.graph.node(id).kind {
        NodeKind::TestDriver(d) => d.import_path.clone(),
        _ => return Ok(()),
    };
    let Some(test_dir) = ctx.graph.parent(id) else {
        return Ok(());
    };
    let Some(package_dir) = ctx.graph.parent(test_dir) else {
        return Ok(());
    };

    let unit_name = format!("{}{}", ENTRY_PACKAGE, ctx.toolchain.unit_extension());
    let unit = ctx.graph.get_or_create_unit(test_dir, &unit_name)?;
    add_unit_source(ctx, unit, id);
    if let NodeKind::Unit(u) = &mut ctx.graph.node_mut(unit).kind {
        u.test_import_path = Some(import_path.clone());
    }

    let exe = ctx.graph.get_or_create_executable(package_dir, TEST_EXE_NAME)?;
    add_executable_unit(ctx, exe, unit);
    if let NodeKind::Executable(e) = &mut ctx.graph.node_mut(exe).kind {
        e.test_import_path = Some(import_path);
    }
    Ok(())
}

fn infer_makefile(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    if !ctx.graph.entry(id).exists() {
        return Ok(());
    }
    let contents = makefile::contents(ctx, id)?;
    if contents.target.is_empty() {
        return Ok(());
    }
    let Some(dir) = ctx.graph.parent(id) else {
        return Ok(());
    };

    let mut sources = Vec::with_capacity(contents.go_files.len());
    for file in &contents.go_files {
        let found = file
            .ends_with(SOURCE_EXT)
            .then(|| ctx.graph.lookup_in(dir, Path::new(file)))
            .flatten()
            .filter(|&src| {
                matches!(
                    ctx.graph.node(src).kind,
                    NodeKind::Source(_) | NodeKind::TestSource(_)
                )
            });
        match found {
            Some(src) => sources.push(src),
            None => {
                return Err(GraphError::UnknownSource {
                    path: ctx.graph.path(dir).join(file),
                })
                .with_context(|| format!("Makefile \"{}\"", ctx.graph.path(id).display()));
            }
        }
    }
    if let NodeKind::Makefile(m) = &mut ctx.graph.node_mut(id).kind {
        m.sources = sources;
    }

    match contents.kind {
        MakefileKind::Cmd => {
            let name = match contents.target.rsplit_once('/') {
                Some((_, base)) => base,
                None => contents.target.as_str(),
            };
            let exe = ctx.graph.get_or_create_executable(dir, name)?;
            if let NodeKind::Executable(e) = &mut ctx.graph.node_mut(exe).kind {
                e.makefile = Some(id);
            }
            if let NodeKind::Makefile(m) = &mut ctx.graph.node_mut(id).kind {
                m.executable = Some(exe);
            }
        }
        MakefileKind::Pkg => {
            let obj_dir = ctx.graph.get_or_create_dir(dir, OBJ_DIR)?;
            let lib = library_for(ctx, obj_dir, &contents.target)?;
            if let NodeKind::Library(l) = &mut ctx.graph.node_mut(lib).kind {
                l.makefile = Some(id);
            }

            let dyn_library = match contents.dyn_library_name() {
                Some(name) => {
                    let dyn_lib =
                        ctx.graph
                            .get_or_create_dyn_library(dir, &name, &contents.target)?;
                    if let NodeKind::DynLibrary(d) = &mut ctx.graph.node_mut(dyn_lib).kind {
                        d.makefile = Some(id);
                    }
                    Some(dyn_lib)
                }
                None => None,
            };
            if let NodeKind::Makefile(m) = &mut ctx.graph.node_mut(id).kind {
                m.library = Some(lib);
                m.dyn_library = dyn_library;
            }

            ctx.registry.map_import_path(
                &ctx.graph,
                &contents.target,
                PackageResolution {
                    library: lib,
                    include_dir: obj_dir,
                    dyn_library,
                },
                false,
            )?;
        }
        MakefileKind::Unknown => {
            tracing::debug!(
                "{}: neither a command nor a package",
                ctx.graph.path(id).display()
            );
        }
    }
    Ok(())
}

fn add_unit_source(ctx: &mut BuildContext, unit: NodeId, src: NodeId) {
    if let NodeKind::Unit(u) = &mut ctx.graph.node_mut(unit).kind {
        if !u.sources.contains(&src) {
            u.sources.push(src);
        }
    }
}

fn add_library_unit(ctx: &mut BuildContext, lib: NodeId, unit: NodeId) {
    if let NodeKind::Library(l) = &mut ctx.graph.node_mut(lib).kind {
        if !l.units.contains(&unit) {
            l.units.push(unit);
        }
    }
}

fn add_executable_unit(ctx: &mut BuildContext, exe: NodeId, unit: NodeId) {
    if let NodeKind::Executable(e) = &mut ctx.graph.node_mut(exe).kind {
        if !e.units.contains(&unit) {
            e.units.push(unit);
        }
    }
}

/// Every source named by an `[executables]` mapping must exist.
fn check_executable_mappings(ctx: &BuildContext) -> Result<()> {
    for (exe, sources) in ctx.workspace.executables() {
        for source in sources {
            let known = ctx
                .graph
                .lookup(source)
                .is_some_and(|id| matches!(ctx.graph.node(id).kind, NodeKind::Source(_)));
            if !known {
                return Err(GraphError::UnknownSource {
                    path: source.clone(),
                })
                .with_context(|| format!("executable \"{}\"", exe.display()));
            }
        }
    }
    Ok(())
}

/// A remote package must not shadow a library built by this project.
fn check_remote_packages(ctx: &BuildContext) -> Result<()> {
    for remote in ctx.workspace.remotes() {
        for import in &remote.import_paths {
            if let Some(pkg) = ctx.registry.lookup(import, false) {
                return Err(ConfigError::RedundantRemote {
                    import: import.clone(),
                    library: ctx.graph.path(pkg.library).display().to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}
