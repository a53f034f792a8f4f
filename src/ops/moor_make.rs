//! Implementation of `moor make` and `moor make-tests`.

use anyhow::Result;

use crate::builder::{self, BuildContext};
use crate::ops::moor_remote::install_remote_packages;
use crate::sources::Fetcher;

/// Build every library and executable of the project.
pub fn make(ctx: &mut BuildContext, fetcher: &mut dyn Fetcher) -> Result<()> {
    install_remote_packages(ctx, fetcher)?;
    let root = ctx.graph.root_id();
    builder::make(ctx, root)
}

/// Build every test binary of the project.
pub fn make_tests(ctx: &mut BuildContext, fetcher: &mut dyn Fetcher) -> Result<()> {
    install_remote_packages(ctx, fetcher)?;
    let root = ctx.graph.root_id();
    builder::make_tests(ctx, root)
}
