//! Installing remote packages.

use anyhow::{anyhow, bail, Result};

use crate::builder::BuildContext;
use crate::sources::{Fetcher, RemotePackage};
use crate::util::ProcessBuilder;

/// Install every remote package whose imports do not resolve yet.
pub fn install_remote_packages(ctx: &mut BuildContext, fetcher: &mut dyn Fetcher) -> Result<()> {
    let remotes: Vec<RemotePackage> = ctx.workspace.remotes().to_vec();
    for remote in &remotes {
        install_remote_package(ctx, fetcher, remote)?;
    }
    Ok(())
}

/// `moor install-deps`.
pub fn install_deps(ctx: &mut BuildContext, fetcher: &mut dyn Fetcher) -> Result<()> {
    if ctx.workspace.remotes().is_empty() {
        bail!("there are no remote packages");
    }
    install_remote_packages(ctx, fetcher)
}

fn install_remote_package(
    ctx: &mut BuildContext,
    fetcher: &mut dyn Fetcher,
    remote: &RemotePackage,
) -> Result<()> {
    let missing = remote
        .import_paths
        .iter()
        .any(|import| ctx.resolve(import, false).is_err());
    if !missing {
        tracing::debug!("remote package \"{}\" is installed", remote.repository.path());
        return Ok(());
    }

    eprintln!(
        "  Installing remote package \"{}\" ({})",
        remote.repository.path(),
        remote.repository.kind()
    );
    let checkout = fetcher.fetch(&remote.repository, &ctx.paths.remote_root)?;
    let cmd = ProcessBuilder::from_argv(&remote.install_cmd)?.cwd(&checkout);
    ctx.runner.run(&cmd)?;

    for import in &remote.import_paths {
        ctx.resolve(import, false).map_err(|_| {
            anyhow!(
                "remote package \"{}\" failed to provide the library \"{}\"",
                remote.repository.path(),
                import
            )
        })?;
    }
    Ok(())
}
