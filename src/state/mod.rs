//! Persisted sweep state.
//!
//! Stores the last run summary plus a bounded history of earlier runs, and
//! provides the lock that keeps two processes from sweeping at once.

mod error;
mod file;
mod lock;
mod memory;
pub mod traits;

use std::sync::Arc;

pub use error::{StateError, StateResult};
pub use file::FileRunHistory;
pub use lock::SweepLock;
pub use memory::MemoryRunHistory;
pub use traits::RunHistory;

use crate::config::StateConfig;

/// Create the run history from configuration.
///
/// Falls back to an in-memory history when no state path can be determined.
pub async fn create_history(config: &StateConfig) -> StateResult<Arc<dyn RunHistory>> {
    let Some(path) = config.history_path() else {
        tracing::warn!("No state directory available, run history will not be persisted");
        return Ok(Arc::new(MemoryRunHistory::new(config.max_history)));
    };

    Ok(Arc::new(FileRunHistory::new(path, config.max_history).await?))
}
