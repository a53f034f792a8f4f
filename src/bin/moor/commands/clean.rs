//! `moor clean` command

use anyhow::Result;

use super::with_project;
use crate::cli::GlobalArgs;
use moor::ops;

pub fn execute(global: &GlobalArgs) -> Result<()> {
    with_project(global, false, ops::clean)
}
