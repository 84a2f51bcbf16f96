//! Retention worker for scheduled and on-demand sweeps.
//!
//! Runs one sweep per day at the configured local time, plus whenever a
//! [`SweepTrigger`] fires. Sweeps never overlap: the loop runs them one at a
//! time and a lock file keeps other processes out.

use std::{path::PathBuf, sync::Arc, time::Instant};

use chrono::{DateTime, Days, Duration, Local, LocalResult, NaiveDateTime, NaiveTime, TimeZone};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::{
    error::{SweepError, SweepResult},
    executor::Sweeper,
    model::{RunSummary, TargetOutcome},
};
use crate::{
    config::SweeperConfig,
    observability::metrics,
    state::{RunHistory, StateError, SweepLock},
};

/// Everything a sweep needs besides its cancellation token.
#[derive(Clone)]
pub struct SweepContext {
    pub sweeper: Sweeper,
    pub history: Arc<dyn RunHistory>,
    /// Lock file held while sweeping. `None` disables cross-process locking.
    pub lock_path: Option<PathBuf>,
}

/// Requests an immediate sweep from a running worker.
///
/// A request made while a sweep is in progress runs once that sweep ends.
#[derive(Clone, Default)]
pub struct SweepTrigger {
    notify: Arc<Notify>,
}

impl SweepTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.notify.notify_one();
    }

    async fn requested(&self) {
        self.notify.notified().await;
    }
}

/// The next instant strictly after `now` whose local time of day is `at`.
///
/// A time skipped by a DST transition resolves one hour later; a repeated
/// time resolves to its first occurrence.
pub fn next_daily_run<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    for offset in 0..=2 {
        let Some(date) = today.checked_add_days(Days::new(offset)) else {
            break;
        };
        if let Some(candidate) = resolve_local(&tz, date.and_time(at))
            && candidate > *now
        {
            return candidate;
        }
    }

    now.clone() + Duration::days(1)
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    }
}

/// Run one sweep on the blocking pool and record its outcome.
///
/// Logs the per-target report, records metrics and appends the summary to
/// the run history. A history write failure is logged and does not fail the
/// sweep.
pub async fn run_sweep(ctx: &SweepContext, cancel: CancellationToken) -> SweepResult<RunSummary> {
    let started = Instant::now();
    let sweeper = ctx.sweeper.clone();
    let lock_path = ctx.lock_path.clone();

    let joined = tokio::task::spawn_blocking(move || {
        let _lock = match lock_path.as_deref().map(SweepLock::acquire) {
            Some(Ok(lock)) => Some(lock),
            Some(Err(StateError::Locked(path))) => return Err(SweepError::Busy(path)),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Could not take sweep lock, continuing without it");
                None
            }
            None => None,
        };
        sweeper.sweep(&cancel)
    })
    .await;

    let result = joined.unwrap_or_else(|e| Err(SweepError::Task(e.to_string())));
    let elapsed = started.elapsed().as_secs_f64();

    match &result {
        Ok(summary) => {
            metrics::record_sweep_run("completed", elapsed);
            log_report(summary);
            if let Err(e) = ctx.history.record(summary).await {
                tracing::error!(error = %e, "Failed to persist run summary");
            }
        }
        Err(SweepError::Cancelled) => {
            metrics::record_sweep_run("cancelled", elapsed);
            tracing::warn!("Retention clean-up cancelled");
        }
        Err(SweepError::Busy(path)) => {
            tracing::warn!(lock = ?path, "Another sweep is running, skipping this one");
        }
        Err(e) => {
            metrics::record_sweep_run("failed", elapsed);
            tracing::error!(error = %e, "Retention clean-up failed");
        }
    }

    result
}

fn log_report(summary: &RunSummary) {
    let dry_run_msg = if summary.dry_run { " (DRY RUN)" } else { "" };

    for target in &summary.target_results {
        if target.outcome == TargetOutcome::Unconfigured {
            continue;
        }

        tracing::info!(
            run_id = %summary.run_id,
            path = %target.path,
            deleted = target.deleted_count,
            max_age_days = target.max_age_days,
            threshold_percent = ?target.threshold_percent,
            threshold_satisfied = target.threshold_satisfied,
            outcome = target.outcome.as_str(),
            "Retention target processed{}",
            dry_run_msg
        );

        for error in &target.errors {
            if target.outcome == TargetOutcome::AboveThreshold {
                tracing::info!(path = %target.path, note = %error, "Retention note");
            } else {
                tracing::warn!(path = %target.path, error = %error, "Retention error");
            }
        }
    }

    tracing::info!(
        run_id = %summary.run_id,
        total_deleted = summary.total_deleted,
        threshold_triggered = summary.threshold_triggered,
        errors = summary.error_count(),
        "Retention run complete{}",
        dry_run_msg
    );
}

/// Starts the retention worker.
///
/// Sweeps daily at `schedule.daily_at` (local time) and whenever `trigger`
/// fires, until `shutdown` is cancelled. Cancelling `shutdown` also aborts a
/// sweep in progress.
///
/// `config` decides whether the worker starts and when it runs; changing the
/// schedule or turning a disabled worker on needs a restart. Turning
/// `retention.enabled` off in the source takes effect at the next scheduled
/// run.
pub async fn start_retention_worker(
    ctx: SweepContext,
    config: SweeperConfig,
    trigger: SweepTrigger,
    shutdown: CancellationToken,
) {
    if !config.retention.enabled {
        tracing::info!("Retention worker disabled by configuration");
        return;
    }

    let at = match config.schedule.time_of_day() {
        Ok(at) => at,
        Err(e) => {
            tracing::error!(error = %e, "Invalid retention schedule, worker not started");
            return;
        }
    };

    let dry_run_msg = if config.retention.safety.dry_run {
        " (DRY RUN)"
    } else {
        ""
    };

    tracing::info!(
        daily_at = %at,
        targets = config.retention.targets.len(),
        disk_threshold = config.retention.enable_disk_threshold,
        dry_run = config.retention.safety.dry_run,
        "Starting retention worker{}",
        dry_run_msg
    );

    if config.schedule.run_on_startup {
        let _ = run_sweep(&ctx, shutdown.child_token()).await;
    }

    loop {
        let now = Local::now();
        let next = next_daily_run(&now, at);
        let wait = next.signed_duration_since(now).to_std().unwrap_or_default();
        tracing::debug!(next_run = %next, "Next retention run scheduled");

        let scheduled = tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("Retention worker stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => true,
            _ = trigger.requested() => {
                tracing::info!("On-demand retention run requested");
                false
            }
        };

        if shutdown.is_cancelled() {
            return;
        }

        // Scheduled runs honour `enabled` as currently configured; on-demand
        // runs always go ahead.
        if scheduled && matches!(ctx.sweeper.scheduling_enabled(), Ok(false)) {
            tracing::info!("Retention disabled in configuration, skipping scheduled run");
            continue;
        }

        let _ = run_sweep(&ctx, shutdown.child_token()).await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};
    use rstest::rstest;

    use super::*;
    use crate::{
        config::{RetentionConfig, RetentionTarget},
        disk::StaticMounts,
        state::MemoryRunHistory,
    };

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[rstest]
    #[case::before_slot((1, 30), (2025, 3, 10, 3, 0))]
    #[case::after_slot((4, 0), (2025, 3, 11, 3, 0))]
    #[case::exactly_at_slot((3, 0), (2025, 3, 11, 3, 0))]
    fn test_next_daily_run_utc(
        #[case] now_hm: (u32, u32),
        #[case] expected: (i32, u32, u32, u32, u32),
    ) {
        let now = Utc.with_ymd_and_hms(2025, 3, 10, now_hm.0, now_hm.1, 0).unwrap();
        let (y, mo, d, h, mi) = expected;
        assert_eq!(
            next_daily_run(&now, at(3, 0)),
            Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
        );
    }

    #[test]
    fn test_next_daily_run_respects_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        // 02:30 local is before the 03:00 slot even though it is 00:30 UTC
        let now = tz.with_ymd_and_hms(2025, 1, 1, 2, 30, 0).unwrap();
        let next = next_daily_run(&now, at(3, 0));
        assert_eq!(next, tz.with_ymd_and_hms(2025, 1, 1, 3, 0, 0).unwrap());
        assert!(next > now);
    }

    #[test]
    fn test_next_daily_run_crosses_month() {
        let now = Utc.with_ymd_and_hms(2025, 1, 31, 23, 0, 0).unwrap();
        assert_eq!(
            next_daily_run(&now, at(3, 0)),
            Utc.with_ymd_and_hms(2025, 2, 1, 3, 0, 0).unwrap()
        );
    }

    fn context(retention: RetentionConfig, history: Arc<dyn RunHistory>) -> SweepContext {
        SweepContext {
            sweeper: Sweeper::new(Arc::new(retention), Arc::new(StaticMounts::default())),
            history,
            lock_path: None,
        }
    }

    #[tokio::test]
    async fn test_run_sweep_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let retention = RetentionConfig {
            enabled: true,
            targets: vec![RetentionTarget::new(dir.path().to_string_lossy(), 3)],
            ..Default::default()
        };
        let history: Arc<dyn RunHistory> = Arc::new(MemoryRunHistory::new(5));
        let ctx = context(retention, history.clone());

        let summary = run_sweep(&ctx, CancellationToken::new()).await.unwrap();
        let last = history.last_run().await.unwrap().unwrap();
        assert_eq!(last.run_id, summary.run_id);
    }

    #[tokio::test]
    async fn test_run_sweep_cancelled_records_nothing() {
        let history: Arc<dyn RunHistory> = Arc::new(MemoryRunHistory::new(5));
        let retention = RetentionConfig {
            targets: vec![RetentionTarget::new("/srv/a", 3)],
            ..Default::default()
        };
        let ctx = context(retention, history.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run_sweep(&ctx, cancel).await;

        assert!(matches!(result, Err(SweepError::Cancelled)));
        assert!(history.last_run().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_sweep_busy_when_locked() {
        let temp = tempfile::tempdir().unwrap();
        let lock_path = temp.path().join(SweepLock::FILE_NAME);
        let _held = SweepLock::acquire(&lock_path).unwrap();

        let history: Arc<dyn RunHistory> = Arc::new(MemoryRunHistory::new(5));
        let mut ctx = context(RetentionConfig::default(), history.clone());
        ctx.lock_path = Some(lock_path);

        let result = run_sweep(&ctx, CancellationToken::new()).await;
        assert!(matches!(result, Err(SweepError::Busy(_))));
        assert!(history.last_run().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_worker_returns() {
        let history: Arc<dyn RunHistory> = Arc::new(MemoryRunHistory::new(5));
        let ctx = context(RetentionConfig::default(), history);
        start_retention_worker(
            ctx,
            SweeperConfig::default(),
            SweepTrigger::new(),
            CancellationToken::new(),
        )
        .await;
    }

    #[tokio::test]
    async fn test_trigger_runs_sweep_then_shutdown() {
        let history: Arc<dyn RunHistory> = Arc::new(MemoryRunHistory::new(5));
        let mut config = SweeperConfig::default();
        config.retention.enabled = true;
        let ctx = context(config.retention.clone(), history.clone());

        let trigger = SweepTrigger::new();
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(start_retention_worker(
            ctx,
            config,
            trigger.clone(),
            shutdown.clone(),
        ));

        trigger.fire();

        let mut recorded = false;
        for _ in 0..100 {
            if history.last_run().await.unwrap().is_some() {
                recorded = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(recorded, "triggered sweep was not recorded");

        shutdown.cancel();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_run_skipped_once_source_disabled() {
        let history: Arc<dyn RunHistory> = Arc::new(MemoryRunHistory::new(5));
        let mut config = SweeperConfig::default();
        config.retention.enabled = true;

        // The worker starts enabled, but the source has since been switched off
        let ctx = context(RetentionConfig::default(), history.clone());
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(start_retention_worker(
            ctx,
            config,
            SweepTrigger::new(),
            shutdown.clone(),
        ));

        tokio::time::sleep(std::time::Duration::from_secs(3 * 24 * 60 * 60)).await;

        shutdown.cancel();
        worker.await.unwrap();
        assert!(history.last_run().await.unwrap().is_none());
    }
}
