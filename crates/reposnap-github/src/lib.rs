//! reposnap GitHub
//!
//! `RepositoryApi` over the GitHub REST API: bearer authentication,
//! `per_page=100` listings followed through `Link` headers, a root contents
//! probe for emptiness and the repository event feed for fingerprints.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod client;
pub mod pagination;

pub use client::GithubClient;
pub use pagination::next_link;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
