//! Remote packages: libraries fetched from a hosted repository and
//! installed by running a command inside the checkout.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{Repository as GitRepository, ResetType};
use url::Url;

use crate::core::errors::ConfigError;

/// Hosting services a remote package can be fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryKind {
    GitHub,
    Bitbucket,
}

impl RepositoryKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Some(RepositoryKind::GitHub),
            "bitbucket" => Some(RepositoryKind::Bitbucket),
            _ => None,
        }
    }

    pub fn host(&self) -> &'static str {
        match self {
            RepositoryKind::GitHub => "github.com",
            RepositoryKind::Bitbucket => "bitbucket.org",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryKind::GitHub => "GitHub",
            RepositoryKind::Bitbucket => "Bitbucket",
        }
    }
}

impl fmt::Display for RepositoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `user/project` repository on a hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    kind: RepositoryKind,
    path: String,
}

impl Repository {
    pub fn new(kind: RepositoryKind, path: &str) -> Result<Self, ConfigError> {
        let path = path.trim();
        let invalid = |hint: String| ConfigError::InvalidRepositoryPath {
            kind: kind.as_str(),
            path: path.to_string(),
            hint,
        };

        if path.contains("://") {
            return Err(invalid(
                "try removing \"https://\" or similar prefixes".to_string(),
            ));
        }
        if path.starts_with(kind.host()) {
            return Err(invalid(format!("try without the \"{}\" prefix", kind.host())));
        }
        if path.ends_with(".git") {
            return Err(invalid("try without the \".git\" suffix".to_string()));
        }
        let mut parts = path.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(user), Some(project), None) if !user.is_empty() && !project.is_empty() => {}
            _ => return Err(invalid("expected \"user/project\"".to_string())),
        }

        Ok(Repository {
            kind,
            path: path.to_string(),
        })
    }

    pub fn kind(&self) -> RepositoryKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn clone_url(&self) -> Result<Url> {
        let base = Url::parse(&format!("https://{}/", self.kind.host()))?;
        base.join(&format!("{}.git", self.path))
            .with_context(|| format!("invalid repository path: {}", self.path))
    }

    /// Where the repository is checked out under `remote_root`.
    pub fn checkout_dir(&self, remote_root: &Path) -> PathBuf {
        remote_root.join(self.kind.host()).join(&self.path)
    }

    /// Clone the repository, or bring an existing checkout up to date.
    pub fn clone_or_update(&self, remote_root: &Path) -> Result<PathBuf> {
        let dir = self.checkout_dir(remote_root);
        let url = self.clone_url()?;

        if dir.exists() {
            tracing::info!("Updating {}", url);
            let repo = GitRepository::open(&dir)
                .with_context(|| format!("failed to open git repository: {}", dir.display()))?;
            let mut remote = repo.find_remote("origin")?;
            remote
                .fetch(&["HEAD"], None, None)
                .with_context(|| format!("failed to fetch {}", url))?;
            let head = repo.find_reference("FETCH_HEAD")?.peel_to_commit()?;
            repo.reset(head.as_object(), ResetType::Hard, None)?;
        } else {
            tracing::info!("Cloning {}", url);
            if let Some(parent) = dir.parent() {
                crate::util::fs::ensure_dir(parent)?;
            }
            GitRepository::clone(url.as_str(), &dir)
                .with_context(|| format!("failed to clone {}", url))?;
        }

        Ok(dir)
    }
}

/// A set of import paths provided by one remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePackage {
    pub import_paths: Vec<String>,
    pub repository: Repository,
    pub install_cmd: Vec<String>,
}

/// Brings a repository checkout up to date and says where it is.
pub trait Fetcher {
    fn fetch(&mut self, repository: &Repository, remote_root: &Path) -> Result<PathBuf>;
}

/// Fetches over the network with libgit2.
#[derive(Debug, Default)]
pub struct GitFetcher;

impl Fetcher for GitFetcher {
    fn fetch(&mut self, repository: &Repository, remote_root: &Path) -> Result<PathBuf> {
        repository.clone_or_update(remote_root)
    }
}
