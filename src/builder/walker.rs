//! Discovery of the initial object set from disk.

use std::collections::BTreeSet;
use std::fs;

use anyhow::{bail, Context, Result};

use crate::builder::context::BuildContext;
use crate::builder::toolchain::Toolchain;
use crate::core::errors::{ConfigError, GraphError};
use crate::core::manifest::{is_config_file_name, DirManifest};
use crate::core::node::*;
use crate::core::workspace::check_source_name;
use crate::core::{
    is_temp_dir_name, CONFIG_FILE_NAME, LIB_EXT, MAKEFILE_NAME, SOURCE_EXT, TEST_SOURCE_SUFFIX,
};
use crate::util::fs::is_executable;

/// Walk the project tree, creating a node for every recognised file and
/// applying each directory's config file before descending into it.
pub fn walk(ctx: &mut BuildContext) -> Result<()> {
    let root = ctx.graph.root_id();
    if !ctx.graph.abs_path(root).is_dir() {
        bail!("not a directory: {}", ctx.root().display());
    }
    read_dir(ctx, root)
}

fn read_dir(ctx: &mut BuildContext, dir: NodeId) -> Result<()> {
    let abs = ctx.graph.abs_path(dir);
    tracing::debug!("read dir {}", ctx.graph.path(dir).display());

    let mut entries = fs::read_dir(&abs)
        .with_context(|| format!("failed to read directory: {}", abs.display()))?
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read directory: {}", abs.display()))?;
    entries.sort_by_key(|e| e.file_name());

    let mut subdirs = Vec::new();
    let mut temp_subdirs = 0;
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            tracing::debug!("ignore {}", entry.path().display());
            continue;
        }

        let meta = entry
            .metadata()
            .with_context(|| format!("failed to stat {}", entry.path().display()))?;
        if meta.is_dir() {
            subdirs.push(ctx.graph.get_or_create_dir(dir, &name)?);
            if is_temp_dir_name(&name) {
                temp_subdirs += 1;
            }
        } else if meta.is_file() {
            let Some(kind) = classify(ctx.toolchain.as_ref(), &name, &meta) else {
                continue;
            };
            add_file(ctx, dir, &name, kind)?;
        }
    }

    let is_root = ctx.graph.parent(dir).is_none();
    let (config, makefile) = ctx
        .graph
        .dir(dir)
        .map(|d| (d.config, d.makefile))
        .unwrap_or_default();
    if is_root && subdirs.len() > temp_subdirs && config.is_none() && makefile.is_none() {
        return Err(GraphError::MissingProjectConfig {
            dir: ctx.root().to_path_buf(),
            config: CONFIG_FILE_NAME,
        }
        .into());
    }

    if let Some(config) = config {
        read_config(ctx, dir, config)?;
    }

    for subdir in subdirs {
        if ctx.workspace.is_ignored(ctx.graph.path(subdir)) {
            tracing::debug!("do not descend into {}", ctx.graph.path(subdir).display());
            continue;
        }
        read_dir(ctx, subdir)?;
    }
    Ok(())
}

/// Node kind for a regular file, or `None` when the file is not ours.
fn classify(toolchain: &dyn Toolchain, name: &str, meta: &fs::Metadata) -> Option<NodeKind> {
    if name.ends_with(TEST_SOURCE_SUFFIX) {
        Some(NodeKind::TestSource(SourceNode::default()))
    } else if name.ends_with(SOURCE_EXT) {
        Some(NodeKind::Source(SourceNode::default()))
    } else if is_config_file_name(name) {
        Some(NodeKind::Config)
    } else if name == MAKEFILE_NAME {
        Some(NodeKind::Makefile(MakefileNode::default()))
    } else if toolchain.is_unit_file(name) {
        Some(NodeKind::Unit(UnitNode::default()))
    } else if name.ends_with(LIB_EXT) {
        Some(NodeKind::Library(LibraryNode::default()))
    } else if is_executable(meta) {
        Some(NodeKind::Executable(ExecutableNode::default()))
    } else {
        None
    }
}

fn add_file(ctx: &mut BuildContext, dir: NodeId, name: &str, kind: NodeKind) -> Result<()> {
    let label = kind.describe();
    let id = ctx.graph.add_child(dir, name, kind)?;
    tracing::debug!("{} {}", label, ctx.graph.path(id).display());

    let dir_path = ctx.graph.path(dir).to_path_buf();
    let (is_test, is_config, is_makefile) = match &ctx.graph.node(id).kind {
        NodeKind::TestSource(_) => (true, false, false),
        NodeKind::Config => (false, true, false),
        NodeKind::Makefile(_) => (false, false, true),
        _ => return Ok(()),
    };

    let d = ctx
        .graph
        .dir_mut(dir)
        .with_context(|| format!("\"{}\" is not a directory", dir_path.display()))?;
    if is_test {
        d.num_test_files += 1;
    } else if is_config {
        if d.config.is_some() {
            bail!("directory \"{}\" contains multiple config files", dir_path.display());
        }
        d.config = Some(id);
    } else if is_makefile {
        if d.makefile.is_some() {
            bail!("directory \"{}\" contains multiple makefiles", dir_path.display());
        }
        d.makefile = Some(id);
    }
    Ok(())
}

/// Load a directory's config file and record what it declares.
fn read_config(ctx: &mut BuildContext, dir: NodeId, config: NodeId) -> Result<()> {
    let abs = ctx.graph.abs_path(config);
    tracing::debug!("read config {}", ctx.graph.path(config).display());
    let manifest = DirManifest::load(&abs)?;

    let dir_path = ctx.graph.path(dir).to_path_buf();
    ctx.workspace
        .apply(&dir_path, &manifest)
        .with_context(|| format!("config file \"{}\"", ctx.graph.path(config).display()))?;

    let sources = match &manifest.sources {
        Some(list) => Some(
            list.iter()
                .map(String::as_str)
                .map(check_source_name)
                .collect::<Result<BTreeSet<_>, ConfigError>>()
                .with_context(|| {
                    format!("config file \"{}\"", ctx.graph.path(config).display())
                })?,
        ),
        None => None,
    };

    if let Some(d) = ctx.graph.dir_mut(dir) {
        d.package = manifest.package.map(|p| p.trim().to_string());
        d.sources = sources;
    }
    Ok(())
}
