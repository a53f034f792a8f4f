//! Driving Makefile escape hatches.
//!
//! A directory with a `Makefile` is built by `make`; moor only reads the
//! Makefile's variables to know what it produces, and builds the packages
//! its sources import before handing over.

use std::sync::Arc;

use anyhow::Result;

use crate::builder::context::BuildContext;
use crate::builder::make::make_prerequisites;
use crate::core::errors::GraphError;
use crate::core::makefile::{print_vars_script, MakefileContents, PRINT_VARS_TARGET};
use crate::core::node::*;
use crate::core::MAKEFILE_NAME;
use crate::util::fs::read_to_string;

/// Variables of the Makefile `id`, read once per command.
pub fn contents(ctx: &mut BuildContext, id: NodeId) -> Result<Arc<MakefileContents>> {
    match &ctx.graph.node(id).kind {
        NodeKind::Makefile(MakefileNode {
            contents: Some(contents),
            ..
        }) => return Ok(Arc::clone(contents)),
        NodeKind::Makefile(_) => {}
        _ => return Err(mismatch(ctx, id)),
    }

    let text = read_to_string(&ctx.graph.abs_path(id))?;
    let dir = ctx.graph.parent(id).unwrap_or_else(|| ctx.graph.root_id());
    let cmd = ctx
        .toolchain
        .make_command()
        .arg("-f")
        .arg("-")
        .arg(PRINT_VARS_TARGET)
        .into_process()
        .cwd(ctx.graph.abs_path(dir))
        .stdin(print_vars_script(&text));
    let output = ctx.runner.output(&cmd, false)?;

    let parsed =
        MakefileContents::from_output(&text, &output).map_err(|message| GraphError::Parse {
            path: ctx.graph.path(id).to_path_buf(),
            message,
        })?;
    tracing::debug!(
        "{}: TARG={} GOFILES={:?}",
        ctx.graph.path(id).display(),
        parsed.target,
        parsed.go_files
    );

    let parsed = Arc::new(parsed);
    if let NodeKind::Makefile(m) = &mut ctx.graph.node_mut(id).kind {
        m.contents = Some(Arc::clone(&parsed));
    }
    Ok(parsed)
}

/// Build whatever the Makefile builds by default.
pub fn make(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    if ctx.graph.build_state(id).built {
        return Ok(());
    }

    ctx.with_building(id, |ctx| {
        let sources = sources(ctx, id)?;
        for src in sources {
            let contents = ctx.graph.source_contents(src)?;
            make_prerequisites(ctx, &contents.imports, None)?;
        }

        run_target(ctx, id, None)?;
        ctx.graph.set_built(id);
        Ok(())
    })
}

/// `make install`, after the default target.
pub fn make_install(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    make(ctx, id)?;
    run_target(ctx, id, Some("install"))
}

/// `make test`.
pub fn make_tests(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    let sources = sources(ctx, id)?;
    for src in sources {
        let contents = ctx.graph.source_contents(src)?;
        make_prerequisites(ctx, &contents.imports, None)?;
    }
    run_target(ctx, id, Some("test"))
}

/// `make clean`.
pub fn clean(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    run_target(ctx, id, Some("clean"))
}

fn sources(ctx: &BuildContext, id: NodeId) -> Result<Vec<NodeId>> {
    match &ctx.graph.node(id).kind {
        NodeKind::Makefile(m) => Ok(m.sources.clone()),
        _ => Err(mismatch(ctx, id)),
    }
}

/// Run `make -f Makefile [target]` in the Makefile's directory, then re-stat
/// everything below it.
fn run_target(ctx: &mut BuildContext, id: NodeId, target: Option<&str>) -> Result<()> {
    let dir = ctx.graph.parent(id).unwrap_or_else(|| ctx.graph.root_id());
    let mut spec = ctx.toolchain.make_command().arg("-f").arg(MAKEFILE_NAME);
    if let Some(target) = target {
        spec = spec.arg(target);
    }
    ctx.run_tool_in(spec, dir)?;
    ctx.graph.refresh_tree(dir)
}

fn mismatch(ctx: &BuildContext, id: NodeId) -> anyhow::Error {
    GraphError::KindMismatch {
        path: ctx.graph.path(id).to_path_buf(),
        expected: "Makefile",
    }
    .into()
}
