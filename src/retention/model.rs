use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a target's sweep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOutcome {
    /// Blank path; nothing to do.
    Unconfigured,
    /// The directory does not exist.
    MissingDirectory,
    /// Disk gating was requested but the volume could not be evaluated.
    DiskUnavailable,
    /// Free space was above the trigger, so the sweep was skipped.
    AboveThreshold,
    /// The directory was walked. Individual files may still have failed.
    Swept,
    /// The directory itself could not be walked.
    EnumerationFailed,
}

impl TargetOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOutcome::Unconfigured => "unconfigured",
            TargetOutcome::MissingDirectory => "missing_directory",
            TargetOutcome::DiskUnavailable => "disk_unavailable",
            TargetOutcome::AboveThreshold => "above_threshold",
            TargetOutcome::Swept => "swept",
            TargetOutcome::EnumerationFailed => "enumeration_failed",
        }
    }
}

/// Result of sweeping one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    /// Directory as configured.
    pub path: String,
    /// Retention actually applied, in days (never below 1).
    pub max_age_days: i64,
    /// Clamped free-space trigger, when disk gating applied to this target.
    pub threshold_percent: Option<u8>,
    /// Free space was at or below the trigger.
    pub threshold_satisfied: bool,
    pub deleted_count: u64,
    /// Failures and skip notes, in the order they occurred.
    #[serde(default)]
    pub errors: Vec<String>,
    pub outcome: TargetOutcome,
}

impl TargetResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result of one full sweep over every configured target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub total_deleted: u64,
    pub timestamp: DateTime<Utc>,
    /// At least one target was swept because its disk was under pressure.
    pub threshold_triggered: bool,
    #[serde(default)]
    pub dry_run: bool,
    pub target_results: Vec<TargetResult>,
}

impl RunSummary {
    /// Build a summary from per-target results; totals are derived from them.
    pub fn new(target_results: Vec<TargetResult>, timestamp: DateTime<Utc>, dry_run: bool) -> Self {
        let total_deleted = target_results.iter().map(|r| r.deleted_count).sum();
        let threshold_triggered = target_results.iter().any(|r| r.threshold_satisfied);

        Self {
            run_id: Uuid::new_v4(),
            total_deleted,
            timestamp,
            threshold_triggered,
            dry_run,
            target_results,
        }
    }

    /// A run that processed nothing.
    pub fn empty(timestamp: DateTime<Utc>, dry_run: bool) -> Self {
        Self::new(Vec::new(), timestamp, dry_run)
    }

    pub fn error_count(&self) -> usize {
        self.target_results.iter().map(|r| r.errors.len()).sum()
    }

    pub fn has_deletions(&self) -> bool {
        self.total_deleted > 0
    }
}
