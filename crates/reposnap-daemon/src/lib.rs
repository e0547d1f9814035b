//! reposnap Daemon
//!
//! The control loop: discover, filter changed, export into staging, rotate,
//! persist fingerprints, sleep. Cycles run strictly one after another.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod driver;
pub mod error;

pub use driver::{CycleSummary, Driver};
pub use error::CycleError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
