//! reposnap Core
//!
//! Shared foundation for the backup daemon:
//! - Repository descriptors, fingerprints and cycle identifiers
//! - Startup settings read from the environment
//! - Collaborator traits for the remote API and the archiver
//! - Repository discovery over any `RepositoryApi`
//! - Cooperative shutdown signalling
//! - Atomic JSON state files
//!
//! # Example
//!
//! ```rust,ignore
//! use reposnap_core::{discover_repositories, Settings};
//!
//! # async fn example(api: &dyn reposnap_core::RepositoryApi) -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::from_env()?;
//! settings.prepare_directories()?;
//!
//! let repos = discover_repositories(api).await?;
//! println!("{} repositories reachable", repos.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod persist;
pub mod shutdown;
pub mod types;

pub use api::{Archiver, RepositoryApi};
#[cfg(any(test, feature = "mock"))]
pub use api::{MockArchiver, MockRepositoryApi};
pub use config::{Credential, RetryPolicy, Settings};
pub use discovery::discover_repositories;
pub use error::{ApiError, ArchiveError, ConfigError, DescriptorError, PersistError};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use types::{CycleId, Fingerprint, RepositoryDescriptor};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with reposnap
    pub use crate::{
        Archiver, CycleId, Fingerprint, RepositoryApi, RepositoryDescriptor, RetryPolicy,
        Settings, ShutdownSignal,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
