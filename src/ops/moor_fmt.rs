//! Implementation of `moor fmt`.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::{walk, BuildContext};
use crate::core::is_temp_dir_name;
use crate::core::node::{NodeId, NodeKind};

/// Reformat every eligible source in place with a single formatter run.
///
/// Only the tree is walked; nothing is inferred.
pub fn fmt(ctx: &mut BuildContext) -> Result<()> {
    walk(ctx)?;

    let paths = fmt_paths(ctx);
    if paths.is_empty() {
        tracing::debug!("nothing to format");
        return Ok(());
    }
    let spec = ctx.toolchain.format_command(&paths, ctx.verbose);
    ctx.run_tool(spec)
}

/// Sources and test sources, minus `no-fmt` files and generated by-products.
pub fn fmt_paths(ctx: &BuildContext) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for id in ctx.graph.ids() {
        let generated = match &ctx.graph.node(id).kind {
            NodeKind::Source(_) => ctx.toolchain.is_generated_source(ctx.graph.entry(id).name()),
            NodeKind::TestSource(_) => false,
            _ => continue,
        };
        let path = ctx.graph.path(id);
        if ctx.workspace.is_fmt_disabled(path) {
            tracing::debug!("fmt disabled: {}", path.display());
        } else if generated || in_temp_dir(ctx, id) {
            tracing::debug!("no fmt (generated): {}", path.display());
        } else {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();
    paths
}

fn in_temp_dir(ctx: &BuildContext, id: NodeId) -> bool {
    ctx.graph
        .parent(id)
        .is_some_and(|dir| is_temp_dir_name(ctx.graph.entry(dir).name()))
}
