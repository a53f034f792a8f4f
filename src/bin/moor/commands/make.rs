//! `moor make` and `moor make-tests` commands

use anyhow::Result;

use super::with_project;
use crate::cli::GlobalArgs;
use moor::ops;
use moor::sources::GitFetcher;

pub fn execute(global: &GlobalArgs) -> Result<()> {
    with_project(global, false, |ctx| ops::make(ctx, &mut GitFetcher))
}

pub fn execute_tests(global: &GlobalArgs) -> Result<()> {
    with_project(global, true, |ctx| ops::make_tests(ctx, &mut GitFetcher))
}
