//! Arkiv - continuous change-log archiving.
//!
//! Drains an ordered stream of change records from a source database,
//! groups them into contiguous validated batches, and persists each batch to
//! an archive store, resuming from the last persisted position after a
//! restart.

pub mod archive;
pub mod archiver;
pub mod config;
pub mod position;
pub mod source;
pub mod supervisor;
pub mod utils;
pub mod validation;
