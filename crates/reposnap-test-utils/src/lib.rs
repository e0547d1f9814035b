//! Testing utilities for reposnap workspace
//!
//! In-memory stand-ins for the remote API and the archiver, plus helpers
//! for building and inspecting generation trees on disk.

#![allow(missing_docs)]

pub mod fakes;
pub mod fixtures;

pub use fakes::{FakeArchiver, StaticApi};
