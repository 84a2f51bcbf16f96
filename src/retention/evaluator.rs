//! Per-target sweep decision.
//!
//! Decides whether a target's directory is swept at all and where its age
//! cutoff lies. Nothing here touches the files inside the directory.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};

use super::model::TargetOutcome;
use crate::{config::RetentionTarget, disk::DiskSpaceLookup};

/// Why a target was not swept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    Unconfigured,
    MissingDirectory,
    DiskUnavailable,
    AboveThreshold { free_percent: f64, threshold: u8 },
}

impl SkipReason {
    /// The note recorded in the target's error list, if any.
    pub fn message(&self, path: &str) -> Option<String> {
        match self {
            SkipReason::Unconfigured => None,
            SkipReason::MissingDirectory => Some(format!("directory '{path}' does not exist")),
            SkipReason::DiskUnavailable => {
                Some(format!("cannot evaluate disk space for '{path}'"))
            }
            SkipReason::AboveThreshold {
                free_percent,
                threshold,
            } => Some(format!(
                "skipped (free space {free_percent:.1}% > threshold {threshold}%)"
            )),
        }
    }

    pub fn outcome(&self) -> TargetOutcome {
        match self {
            SkipReason::Unconfigured => TargetOutcome::Unconfigured,
            SkipReason::MissingDirectory => TargetOutcome::MissingDirectory,
            SkipReason::DiskUnavailable => TargetOutcome::DiskUnavailable,
            SkipReason::AboveThreshold { .. } => TargetOutcome::AboveThreshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Proceed,
    Skip(SkipReason),
}

/// Outcome of evaluating one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// Files modified at or before this instant are eligible for deletion.
    pub cutoff: DateTime<Utc>,
    pub threshold_percent: Option<u8>,
    pub threshold_satisfied: bool,
}

impl Evaluation {
    fn new(verdict: Verdict, cutoff: DateTime<Utc>) -> Self {
        Self {
            verdict,
            cutoff,
            threshold_percent: None,
            threshold_satisfied: false,
        }
    }

    pub fn should_sweep(&self) -> bool {
        matches!(self.verdict, Verdict::Proceed)
    }
}

/// `now` minus the retention period, which is never shorter than one day.
pub fn cutoff_for(max_age_days: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(max_age_days.max(1))
}

/// Decide whether `target` should be swept.
///
/// Disk gating only applies when `disk_threshold_enabled` is set and the
/// target has a trigger percentage. A gated target is swept only while the
/// free space on its volume is at or below the trigger.
pub fn evaluate(
    target: &RetentionTarget,
    disk_threshold_enabled: bool,
    disks: &dyn DiskSpaceLookup,
    now: DateTime<Utc>,
) -> Evaluation {
    let cutoff = cutoff_for(target.max_age_days, now);

    if !target.is_configured() {
        tracing::debug!("Skipping empty retention target");
        return Evaluation::new(Verdict::Skip(SkipReason::Unconfigured), cutoff);
    }

    let path = Path::new(&target.path);
    if !path.is_dir() {
        tracing::warn!(path = %target.path, "Retention path does not exist");
        return Evaluation::new(Verdict::Skip(SkipReason::MissingDirectory), cutoff);
    }

    let threshold = match target.effective_trigger_percent() {
        Some(threshold) if disk_threshold_enabled => threshold,
        _ => return Evaluation::new(Verdict::Proceed, cutoff),
    };

    let mut evaluation = Evaluation::new(Verdict::Proceed, cutoff);
    evaluation.threshold_percent = Some(threshold);

    let free_percent = match disks.query(path) {
        Ok(info) => info.free_percent(),
        Err(e) => {
            tracing::debug!(path = %target.path, error = %e, "Disk lookup failed");
            None
        }
    };

    let Some(free_percent) = free_percent else {
        tracing::warn!(path = %target.path, "Unable to evaluate disk space");
        evaluation.verdict = Verdict::Skip(SkipReason::DiskUnavailable);
        return evaluation;
    };

    if free_percent > f64::from(threshold) {
        tracing::info!(
            path = %target.path,
            free_percent = format!("{free_percent:.1}"),
            threshold,
            "Free space above threshold, skipping clean-up"
        );
        evaluation.verdict = Verdict::Skip(SkipReason::AboveThreshold {
            free_percent,
            threshold,
        });
        return evaluation;
    }

    tracing::info!(
        path = %target.path,
        free_percent = format!("{free_percent:.1}"),
        threshold,
        "Free space at or below threshold, running clean-up"
    );
    evaluation.threshold_satisfied = true;
    evaluation
}
