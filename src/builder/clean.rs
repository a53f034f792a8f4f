//! Removing build products.

use anyhow::Result;

use crate::builder::context::BuildContext;
use crate::builder::makefile;
use crate::core::node::*;
use crate::core::{is_temp_dir_name, TEST_DIR, TEST_DRIVER_NAME};
use crate::util::fs::{is_empty_dir, remove_file_if_exists};

/// Remove everything moor would produce below `id`.
///
/// Files that merely share a product's name are kept unless something in
/// the project builds them, or they live in an intermediate directory.
pub fn clean(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    if !ctx.graph.entry(id).exists() {
        return Ok(());
    }

    let remove = match &ctx.graph.node(id).kind {
        NodeKind::Dir(_) => return clean_dir(ctx, id),
        NodeKind::Unit(u) => !u.sources.is_empty() || in_temp_dir(ctx, id),
        NodeKind::Library(l) => {
            !l.units.is_empty() || l.makefile.is_some() || in_temp_dir(ctx, id)
        }
        NodeKind::Executable(e) => {
            !e.units.is_empty() || e.makefile.is_some() || in_temp_dir(ctx, id)
        }
        NodeKind::DynLibrary(d) => d.makefile.is_some(),
        NodeKind::TestDriver(_) => true,
        NodeKind::Source(_) => {
            let name = ctx.graph.entry(id).name();
            ctx.toolchain.is_generated_source(name) || is_stale_driver(ctx, id)
        }
        NodeKind::TestSource(_) | NodeKind::Config | NodeKind::Makefile(_) => false,
    };

    if remove {
        tracing::debug!("remove {}", ctx.graph.path(id).display());
        remove_file_if_exists(&ctx.graph.abs_path(id))?;
        ctx.graph.refresh(id)?;
    }
    Ok(())
}

fn clean_dir(ctx: &mut BuildContext, id: NodeId) -> Result<()> {
    let makefile = ctx.graph.dir(id).and_then(|d| d.makefile);
    if let Some(m) = makefile {
        makefile::clean(ctx, m)?;
    }
    for child in ctx.graph.children(id) {
        if Some(child) != makefile {
            clean(ctx, child)?;
        }
    }

    let abs = ctx.graph.abs_path(id);
    if in_temp_dir(ctx, id) && abs.is_dir() && is_empty_dir(&abs)? {
        tracing::debug!("remove {}", ctx.graph.path(id).display());
        std::fs::remove_dir(&abs)?;
        ctx.graph.refresh(id)?;
    }
    Ok(())
}

/// Whether `id` is, or lies below, an intermediate directory.
fn in_temp_dir(ctx: &BuildContext, id: NodeId) -> bool {
    let mut current = Some(id);
    while let Some(node) = current {
        if matches!(ctx.graph.node(node).kind, NodeKind::Dir(_))
            && is_temp_dir_name(ctx.graph.entry(node).name())
        {
            return true;
        }
        current = ctx.graph.parent(node);
    }
    false
}

/// A driver left behind for a package that no longer has tests.
fn is_stale_driver(ctx: &BuildContext, id: NodeId) -> bool {
    ctx.graph.entry(id).name() == TEST_DRIVER_NAME
        && ctx
            .graph
            .parent(id)
            .is_some_and(|p| ctx.graph.entry(p).name() == TEST_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{infer::infer_all, make::make, walker::walk};
    use crate::test_support::{context, write_file, ProjectFixture};
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_products_and_temp_dirs() {
        let tmp = TempDir::new().unwrap();
        ProjectFixture::new()
            .package("lib", "x/lib", &[("lib.go", &[])])
            .command("main.go", &["x/lib"])
            .write(tmp.path());

        let mut ctx = context(tmp.path());
        walk(&mut ctx).unwrap();
        infer_all(&mut ctx, false).unwrap();
        let root = ctx.graph.root_id();
        make(&mut ctx, root).unwrap();
        assert!(tmp.path().join("lib/_obj/x/lib.a").is_file());
        assert!(tmp.path().join("a.out").is_file());

        clean(&mut ctx, root).unwrap();
        assert!(!tmp.path().join("a.out").exists());
        assert!(!tmp.path().join("lib/_obj").exists());
        assert!(!tmp.path().join("_obj").exists());
        assert!(tmp.path().join("lib/lib.go").is_file());
        assert!(tmp.path().join("main.go").is_file());
    }

    #[test]
    fn test_clean_keeps_unrelated_files() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "moor.toml", "");
        write_file(tmp.path(), "vendor.o", "prebuilt");
        write_file(tmp.path(), "_obj/keep.txt", "notes");

        let mut ctx = context(tmp.path());
        walk(&mut ctx).unwrap();
        infer_all(&mut ctx, false).unwrap();
        let root = ctx.graph.root_id();
        clean(&mut ctx, root).unwrap();

        assert!(tmp.path().join("vendor.o").is_file());
        assert!(tmp.path().join("_obj/keep.txt").is_file());
        assert!(ctx.graph.entry(ctx.graph.lookup(Path::new("_obj")).unwrap()).exists());
    }
}
