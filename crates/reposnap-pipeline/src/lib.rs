//! reposnap Pipeline
//!
//! The two stages between discovery and rotation:
//! - `ChangeTracker`: which repositories changed since the last cycle
//! - `ExportPipeline`: retry-bounded, cancellable export into staging
//!
//! plus the `GitArchiver` that produces one bundle per repository.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod git;
pub mod guard;
pub mod pipeline;
pub mod store;
pub mod tracker;

pub use error::{ExportError, StoreError, UnsafeName};
pub use git::GitArchiver;
pub use guard::validate_descriptor;
pub use pipeline::{ExportPipeline, ExportReport};
pub use store::FingerprintStore;
pub use tracker::ChangeTracker;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
