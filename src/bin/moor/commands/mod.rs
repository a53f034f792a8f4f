//! Command implementations

pub mod clean;
pub mod completions;
pub mod fmt;
pub mod info;
pub mod install;
pub mod make;

use anyhow::Result;

use crate::cli::GlobalArgs;
use moor::ops::{self, LoadOptions};
use moor::{BuildContext, GlobalContext};

fn load_options(global: &GlobalArgs, update_tests: bool) -> LoadOptions {
    LoadOptions {
        toolchain: global.toolchain.clone(),
        timings: global.timings,
        update_tests,
    }
}

/// Load the project in the current directory and run `f` on it.
///
/// With `--timings`, the per-tool report is printed afterwards, also when
/// `f` failed.
pub fn with_project<T>(
    global: &GlobalArgs,
    update_tests: bool,
    f: impl FnOnce(&mut BuildContext) -> Result<T>,
) -> Result<T> {
    let mut gctx = GlobalContext::new()?;
    gctx.set_verbose(global.verbose);
    let opts = load_options(global, update_tests);

    let mut ctx = ops::open(&gctx, &opts)?;
    let result = ops::boot(&mut ctx, update_tests).and_then(|()| f(&mut ctx));
    print_timings(&ctx);
    result
}

/// Like [`with_project`], without inferring anything.
pub fn with_tree<T>(
    global: &GlobalArgs,
    f: impl FnOnce(&mut BuildContext) -> Result<T>,
) -> Result<T> {
    let mut gctx = GlobalContext::new()?;
    gctx.set_verbose(global.verbose);

    let mut ctx = ops::open(&gctx, &load_options(global, false))?;
    let result = f(&mut ctx);
    print_timings(&ctx);
    result
}

fn print_timings(ctx: &BuildContext) {
    if let Some(timings) = ctx.runner.timings() {
        if !timings.is_empty() {
            eprintln!();
            eprintln!("{}", timings.report());
        }
    }
}
