//! `moor info` command

use anyhow::Result;

use super::with_project;
use crate::cli::{GlobalArgs, InfoArgs};
use moor::ops::Inventory;

pub fn execute(args: InfoArgs, global: &GlobalArgs) -> Result<()> {
    let inventory = with_project(global, false, |ctx| Ok(Inventory::collect(ctx)))?;

    if args.json {
        println!("{}", inventory.to_json()?);
    } else if inventory.is_empty() {
        eprintln!("Nothing to build");
    } else {
        print!("{}", inventory.render(global.verbose));
    }
    Ok(())
}
