//! `moor fmt` command

use anyhow::Result;

use super::with_tree;
use crate::cli::GlobalArgs;
use moor::ops;

pub fn execute(global: &GlobalArgs) -> Result<()> {
    with_tree(global, ops::fmt)
}
