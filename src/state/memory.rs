use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{error::StateResult, traits::RunHistory};
use crate::retention::RunSummary;

/// Run history that lives only as long as the process.
///
/// Used when no state directory is available.
pub struct MemoryRunHistory {
    max_history: usize,
    runs: RwLock<Vec<RunSummary>>,
}

impl MemoryRunHistory {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            runs: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RunHistory for MemoryRunHistory {
    async fn record(&self, summary: &RunSummary) -> StateResult<()> {
        let mut runs = self.runs.write().await;
        runs.insert(0, summary.clone());
        runs.truncate(self.max_history);
        Ok(())
    }

    async fn last_run(&self) -> StateResult<Option<RunSummary>> {
        Ok(self.runs.read().await.first().cloned())
    }

    async fn history(&self, limit: usize) -> StateResult<Vec<RunSummary>> {
        Ok(self.runs.read().await.iter().take(limit).cloned().collect())
    }
}
