use async_trait::async_trait;

use super::error::StateResult;
use crate::retention::RunSummary;

/// Persisted record of past sweeps.
#[async_trait]
pub trait RunHistory: Send + Sync {
    /// Store a finished sweep as the most recent run.
    async fn record(&self, summary: &RunSummary) -> StateResult<()>;

    /// The most recent run, if any sweep has completed.
    async fn last_run(&self) -> StateResult<Option<RunSummary>>;

    /// Up to `limit` runs, newest first.
    async fn history(&self, limit: usize) -> StateResult<Vec<RunSummary>>;
}
