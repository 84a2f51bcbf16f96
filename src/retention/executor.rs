//! Sweep execution.
//!
//! Walks each target directory and deletes files older than the target's
//! cutoff. Blocking filesystem I/O throughout; async callers should run
//! [`Sweeper::sweep`] on the blocking pool.

use std::{io, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::{
    error::{SourceResult, SweepError, SweepResult},
    evaluator::{Evaluation, Verdict, evaluate},
    model::{RunSummary, TargetOutcome, TargetResult},
    source::RetentionSource,
};
use crate::{config::RetentionTarget, disk::DiskSpaceLookup, observability::metrics};

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    /// Count and log eligible files without deleting them. Also enabled by
    /// `[retention.safety] dry_run` in the loaded configuration.
    pub dry_run: bool,
}

/// Deletes one expired file.
pub trait FileRemover: Send + Sync {
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Deletes through the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRemover;

impl FileRemover for FsRemover {
    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Runs sweeps over the targets provided by a [`RetentionSource`].
#[derive(Clone)]
pub struct Sweeper {
    source: Arc<dyn RetentionSource>,
    disks: Arc<dyn DiskSpaceLookup>,
    remover: Arc<dyn FileRemover>,
    options: SweepOptions,
}

impl Sweeper {
    pub fn new(source: Arc<dyn RetentionSource>, disks: Arc<dyn DiskSpaceLookup>) -> Self {
        Self {
            source,
            disks,
            remover: Arc::new(FsRemover),
            options: SweepOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_remover(mut self, remover: Arc<dyn FileRemover>) -> Self {
        self.remover = remover;
        self
    }

    /// Whether the source currently has scheduled sweeping switched on.
    pub fn scheduling_enabled(&self) -> SourceResult<bool> {
        self.source.load().map(|config| config.enabled)
    }

    /// Sweep every configured target once.
    ///
    /// Returns [`SweepError::Cancelled`] if `cancel` fires before the last
    /// target finishes; no partial summary is produced.
    pub fn sweep(&self, cancel: &CancellationToken) -> SweepResult<RunSummary> {
        self.sweep_at(Utc::now(), cancel)
    }

    /// Sweep as if the current time were `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> SweepResult<RunSummary> {
        let config = match self.source.load() {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Retention configuration unavailable, skipping clean-up");
                return Ok(RunSummary::empty(now, self.options.dry_run));
            }
        };

        let dry_run = self.options.dry_run || config.safety.dry_run;
        tracing::info!(
            targets = config.targets.len(),
            dry_run,
            "Starting retention clean-up"
        );

        let mut results = Vec::with_capacity(config.targets.len());
        for target in &config.targets {
            if cancel.is_cancelled() {
                return Err(SweepError::Cancelled);
            }
            let result = self.sweep_target(
                target,
                config.enable_disk_threshold,
                now,
                dry_run,
                cancel,
            )?;
            results.push(result);
        }

        Ok(RunSummary::new(results, Utc::now(), dry_run))
    }

    fn sweep_target(
        &self,
        target: &RetentionTarget,
        disk_threshold_enabled: bool,
        now: DateTime<Utc>,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> SweepResult<TargetResult> {
        let evaluation = evaluate(target, disk_threshold_enabled, self.disks.as_ref(), now);

        let mut result = TargetResult {
            path: target.path.clone(),
            max_age_days: target.effective_max_age_days(),
            threshold_percent: evaluation.threshold_percent,
            threshold_satisfied: evaluation.threshold_satisfied,
            deleted_count: 0,
            errors: Vec::new(),
            outcome: TargetOutcome::Swept,
        };

        if let Verdict::Skip(reason) = evaluation.verdict {
            result.outcome = reason.outcome();
            result.errors.extend(reason.message(&target.path));
            return Ok(result);
        }

        delete_expired(
            Path::new(&target.path),
            &evaluation,
            self.remover.as_ref(),
            dry_run,
            cancel,
            &mut result,
        )?;

        if result.deleted_count > 0 && !dry_run {
            metrics::record_retention_deletion(&target.path, result.deleted_count);
        }

        Ok(result)
    }
}

/// Walk `root` and delete every regular file modified at or before the
/// evaluation's cutoff. Symlinks are neither followed nor deleted.
fn delete_expired(
    root: &Path,
    evaluation: &Evaluation,
    remover: &dyn FileRemover,
    dry_run: bool,
    cancel: &CancellationToken,
    result: &mut TargetResult,
) -> SweepResult<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        if cancel.is_cancelled() {
            return Err(SweepError::Cancelled);
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let detail = e
                    .io_error()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| e.to_string());
                tracing::error!(
                    path = %root.display(),
                    error = %detail,
                    "Unable to enumerate files for retention path"
                );
                metrics::record_retention_error("enumerate");
                result
                    .errors
                    .push(format!("cannot walk directory '{}': {detail}", root.display()));
                result.outcome = TargetOutcome::EnumerationFailed;
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping inaccessible entry");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let modified = entry
            .metadata()
            .map_err(io::Error::from)
            .and_then(|metadata| metadata.modified());
        let modified: DateTime<Utc> = match modified {
            Ok(modified) => modified.into(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                record_file_error(path, &e, result);
                continue;
            }
        };

        if modified > evaluation.cutoff {
            continue;
        }

        if dry_run {
            tracing::info!(file = %path.display(), modified = %modified, "DRY RUN: Would delete expired file");
            result.deleted_count += 1;
            continue;
        }

        match remover.remove(path) {
            Ok(()) => {
                tracing::info!(file = %path.display(), "Deleted expired file");
                result.deleted_count += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => record_file_error(path, &e, result),
        }
    }

    Ok(())
}

fn record_file_error(path: &Path, error: &io::Error, result: &mut TargetResult) {
    tracing::warn!(file = %path.display(), error = %error, "Failed to delete file");
    metrics::record_retention_error("delete");
    result.errors.push(format!("{}: {error}", path.display()));
}
