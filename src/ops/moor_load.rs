//! Loading a project: discovery, version checks and inference.

use anyhow::{bail, Context, Result};

use crate::builder::{infer_all, toolchain, walk, BuildContext};
use crate::core::errors::ConfigError;
use crate::util::{GlobalContext, SystemRunner};

/// How a command wants its project loaded.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Toolchain kind overriding the configured one.
    pub toolchain: Option<String>,

    /// Record per-tool timings.
    pub timings: bool,

    /// Write generated test drivers to disk.
    pub update_tests: bool,
}

/// Create a build context for the project in the current directory,
/// running real tools. External commands are echoed when `gctx` is verbose.
pub fn open(gctx: &GlobalContext, opts: &LoadOptions) -> Result<BuildContext> {
    let toolchain = toolchain::from_config(&gctx.config().toolchain, opts.toolchain.as_deref())?;
    let runner = SystemRunner::new()
        .verbose(gctx.is_verbose())
        .with_timings(opts.timings);

    let mut ctx = BuildContext::new(
        gctx.cwd(),
        toolchain,
        Box::new(runner),
        gctx.install_paths(),
    )?;
    ctx.verbose = gctx.is_verbose();
    Ok(ctx)
}

/// Open the project and infer its full object graph.
pub fn load(gctx: &GlobalContext, opts: &LoadOptions) -> Result<BuildContext> {
    let mut ctx = open(gctx, opts)?;
    boot(&mut ctx, opts.update_tests)?;
    Ok(ctx)
}

/// Walk the tree, check the toolchain version, then infer.
pub fn boot(ctx: &mut BuildContext, update_tests: bool) -> Result<()> {
    walk(ctx)?;
    check_toolchain_version(ctx)?;
    infer_all(ctx, update_tests)
}

/// Enforce the highest `min-toolchain-version` declared anywhere.
pub fn check_toolchain_version(ctx: &mut BuildContext) -> Result<()> {
    let Some(required) = ctx.workspace.min_toolchain_version().cloned() else {
        return Ok(());
    };

    let cmd = ctx
        .toolchain
        .version_command()
        .into_process()
        .cwd(ctx.root());
    let output = ctx
        .runner
        .output(&cmd, true)
        .context("failed to determine the toolchain version")?;
    let Some(found) = ctx.toolchain.parse_version(&output) else {
        bail!(
            "unable to determine the toolchain version from \"{}\"",
            output.trim()
        );
    };

    tracing::debug!("toolchain version {} (required {})", found, required);
    if found < required {
        return Err(ConfigError::InsufficientVersion {
            found: found.to_string(),
            required: required.to_string(),
        }
        .into());
    }
    Ok(())
}
