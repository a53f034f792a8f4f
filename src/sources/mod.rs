//! Remote package sources.
//!
//! Remote packages are fetched from hosted repositories and installed by a
//! command run inside the checkout.

pub mod remote;

pub use remote::{Fetcher, GitFetcher, RemotePackage, Repository, RepositoryKind};
