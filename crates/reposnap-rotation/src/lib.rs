//! reposnap Rotation
//!
//! Generational history for backup snapshots. Each cycle's export becomes
//! `T-0`; older generations shift up by one, repositories missing from a
//! newer generation are carried forward from older ones, and generations
//! beyond the retention limit are evicted.
//!
//! Rotation is synchronous filesystem work. Callers on an async runtime run
//! it on a blocking thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use reposnap_rotation::RotationEngine;
//!
//! let engine = RotationEngine::new("/srv/backups", 30);
//! engine.recover()?;
//! let report = engine.rotate(staging.path())?;
//! println!("evicted {:?}", report.evicted);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod engine;
pub mod error;
pub mod fsops;
pub mod journal;
pub mod layout;

pub use engine::{recover, rotate, RotationEngine, RotationReport};
pub use error::RotationError;
pub use journal::{Phase, RotationJournal, JOURNAL_FILE_NAME};
pub use layout::{generation_dir, list_generations, parse_generation, GENERATION_PREFIX};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
