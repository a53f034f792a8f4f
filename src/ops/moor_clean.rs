//! Implementation of `moor clean`.

use anyhow::Result;

use crate::builder::{self, BuildContext};

/// Remove every build product of the project.
pub fn clean(ctx: &mut BuildContext) -> Result<()> {
    let root = ctx.graph.root_id();
    builder::clean(ctx, root)
}
