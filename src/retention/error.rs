use thiserror::Error;

use crate::config::ConfigError;

/// Failure to obtain the retention configuration for a sweep.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Retention configuration is invalid: {0}")]
    Config(#[from] ConfigError),

    #[error("Retention configuration is unavailable: {0}")]
    Unavailable(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Sweep cancelled")]
    Cancelled,

    #[error("Another sweep is already running (lock held at {})", .0.display())]
    Busy(std::path::PathBuf),

    #[error("Sweep task failed: {0}")]
    Task(String),
}

pub type SweepResult<T> = Result<T, SweepError>;
