//! Implementation of `moor install` and `moor uninstall`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use walkdir::WalkDir;

use crate::builder::make::{install_dyn_library, install_executable, make_library};
use crate::builder::BuildContext;
use crate::core::node::{NodeId, NodeKind};
use crate::core::InstallDirective;
use crate::ops::moor_remote::install_remote_packages;
use crate::resolver::{installed_library_path, PackageResolution};
use crate::sources::Fetcher;
use crate::util::fs::{
    copy_dir_all, copy_file, is_empty_dir, relative_path, remove_file_if_exists,
};

/// Put every declared library, executable and directory into place.
pub fn install(ctx: &mut BuildContext, fetcher: &mut dyn Fetcher) -> Result<()> {
    let directives = ctx.workspace.installs().to_vec();
    if directives.is_empty() {
        bail!("nothing to install");
    }
    check_supported(ctx)?;
    install_remote_packages(ctx, fetcher)?;

    for directive in &directives {
        match directive {
            InstallDirective::Package { import_path } => install_package(ctx, import_path)?,
            InstallDirective::Executable { path } => {
                let exe = executable(ctx, path)?;
                eprintln!("  Installing {}", path.display());
                install_executable(ctx, exe)?;
            }
            InstallDirective::Dir { src, dst } => {
                let from = ctx.root().join(src);
                let to = installed_dir_path(ctx, src, dst);
                eprintln!("  Installing {} -> {}", src.display(), to.display());
                copy_dir_all(&from, &to)?;
            }
        }
    }
    Ok(())
}

/// Remove everything `install` would have put into place.
pub fn uninstall(ctx: &mut BuildContext) -> Result<()> {
    let directives = ctx.workspace.installs().to_vec();
    if directives.is_empty() {
        bail!("nothing to uninstall");
    }
    check_supported(ctx)?;

    let lib_root = ctx.paths.lib_root.clone();
    for directive in &directives {
        match directive {
            InstallDirective::Package { import_path } => {
                let pkg = local_package(ctx, import_path)?;
                let lib = installed_library_path(&lib_root, import_path);
                remove_installed(&lib)?;
                if let Some(parent) = lib.parent() {
                    remove_empty_ancestors(parent, &lib_root)?;
                }
                if let Some(dyn_lib) = pkg.dyn_library {
                    remove_installed(&lib_root.join(ctx.graph.entry(dyn_lib).name()))?;
                }
            }
            InstallDirective::Executable { path } => {
                let exe = executable(ctx, path)?;
                remove_installed(&ctx.paths.bin_dir.join(ctx.graph.entry(exe).name()))?;
            }
            InstallDirective::Dir { src, dst } => {
                let from = ctx.root().join(src);
                let to = installed_dir_path(ctx, src, dst);
                remove_mirrored(&from, &to)?;
                if let Some(parent) = to.parent() {
                    remove_empty_ancestors(parent, &lib_root)?;
                }
            }
        }
    }
    Ok(())
}

fn check_supported(ctx: &BuildContext) -> Result<()> {
    if !ctx.toolchain.supports_install() {
        bail!(
            "the {} toolchain does not support installation",
            ctx.toolchain.kind().as_str()
        );
    }
    Ok(())
}

fn install_package(ctx: &mut BuildContext, import_path: &str) -> Result<()> {
    let pkg = local_package(ctx, import_path)?;
    make_library(ctx, pkg.library)?;

    let dst = installed_library_path(&ctx.paths.lib_root, import_path);
    eprintln!("  Installing {}", import_path);
    tracing::debug!("install {}", dst.display());
    copy_file(&ctx.graph.abs_path(pkg.library), &dst)?;

    if let Some(dyn_lib) = pkg.dyn_library {
        install_dyn_library(ctx, dyn_lib)?;
    }
    Ok(())
}

fn local_package(ctx: &BuildContext, import_path: &str) -> Result<PackageResolution> {
    ctx.registry
        .lookup(import_path, false)
        .copied()
        .ok_or_else(|| anyhow!("package \"{}\" is not built by this project", import_path))
}

fn executable(ctx: &BuildContext, path: &Path) -> Result<NodeId> {
    let id = ctx
        .graph
        .lookup(path)
        .with_context(|| format!("executable \"{}\" is not built by this project", path.display()))?;
    match &ctx.graph.node(id).kind {
        NodeKind::Executable(exe) if exe.is_test() => {
            bail!("test executable \"{}\" cannot be installed", path.display())
        }
        NodeKind::Executable(_) => Ok(id),
        other => bail!(
            "\"{}\" is a {}, not an executable",
            path.display(),
            other.describe()
        ),
    }
}

/// `<lib root>/<dst>/<last element of src>`.
fn installed_dir_path(ctx: &BuildContext, src: &Path, dst: &Path) -> PathBuf {
    let to = ctx.paths.lib_root.join(dst);
    match src.file_name() {
        Some(name) => to.join(name),
        None => to,
    }
}

fn remove_installed(path: &Path) -> Result<()> {
    if remove_file_if_exists(path)? {
        eprintln!("    Removing {}", path.display());
    }
    Ok(())
}

/// Remove from `installed` each file mirrored from `source`, then every
/// directory left empty.
///
/// Files only present in `installed` are kept.
pub fn remove_mirrored(source: &Path, installed: &Path) -> Result<()> {
    for entry in WalkDir::new(source).contents_first(true) {
        let entry =
            entry.with_context(|| format!("failed to read directory: {}", source.display()))?;
        let target = installed.join(relative_path(source, entry.path()));

        if entry.file_type().is_dir() {
            if target.is_dir() && is_empty_dir(&target)? {
                tracing::debug!("remove {}", target.display());
                std::fs::remove_dir(&target)
                    .with_context(|| format!("failed to remove directory: {}", target.display()))?;
            }
        } else {
            remove_installed(&target)?;
        }
    }
    Ok(())
}

/// Climb from `dir` towards `stop`, removing directories that are empty.
///
/// `stop` itself is never removed, and nothing outside it is touched.
pub fn remove_empty_ancestors(dir: &Path, stop: &Path) -> Result<()> {
    let mut current = Some(dir);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) || !dir.is_dir() || !is_empty_dir(dir)? {
            break;
        }
        tracing::debug!("remove {}", dir.display());
        std::fs::remove_dir(dir)
            .with_context(|| format!("failed to remove directory: {}", dir.display()))?;
        current = dir.parent();
    }
    Ok(())
}
