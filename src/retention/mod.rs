//! File retention sweeping.
//!
//! For each configured target directory:
//! 1. The evaluator checks the directory exists and, when disk gating is on,
//!    that free space on its volume is at or below the trigger
//! 2. The executor walks the directory and deletes files last modified at or
//!    before `now - max_age_days`
//! 3. Per-target results are aggregated into a [`RunSummary`]
//!
//! Failures on individual files or targets are collected into the summary
//! rather than aborting the sweep. Dry-run mode counts eligible files
//! without deleting them.

mod error;
pub mod evaluator;
mod executor;
mod model;
mod source;
mod worker;

pub use error::{SourceError, SourceResult, SweepError, SweepResult};
pub use evaluator::{Evaluation, SkipReason, Verdict, cutoff_for, evaluate};
pub use executor::{FileRemover, FsRemover, SweepOptions, Sweeper};
pub use model::{RunSummary, TargetOutcome, TargetResult};
pub use source::{ConfigFileSource, RetentionSource};
pub use worker::{SweepContext, SweepTrigger, next_daily_run, run_sweep, start_retention_worker};
