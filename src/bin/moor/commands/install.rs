//! `moor install`, `moor uninstall` and `moor install-deps` commands

use anyhow::Result;

use super::with_project;
use crate::cli::GlobalArgs;
use moor::ops;
use moor::sources::GitFetcher;

pub fn execute(global: &GlobalArgs) -> Result<()> {
    with_project(global, false, |ctx| ops::install(ctx, &mut GitFetcher))
}

pub fn execute_uninstall(global: &GlobalArgs) -> Result<()> {
    with_project(global, false, ops::uninstall)
}

pub fn execute_deps(global: &GlobalArgs) -> Result<()> {
    with_project(global, false, |ctx| ops::install_deps(ctx, &mut GitFetcher))
}
