//! Scheduled file-retention sweeper.
//!
//! Deletes files older than a per-directory age from a set of configured
//! target directories, optionally only while the volume holding a directory
//! is low on free space. Each sweep produces a [`retention::RunSummary`] that
//! is persisted as the last run.

pub mod config;
pub mod disk;
pub mod observability;
pub mod retention;
pub mod state;

#[cfg(test)]
mod tests;
