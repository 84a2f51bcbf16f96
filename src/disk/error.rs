use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiskError {
    #[error("No drive information for {}", .0.display())]
    NoDrive(PathBuf),

    #[error("Drive for {} is not ready", .0.display())]
    NotReady(PathBuf),
}

pub type DiskResult<T> = Result<T, DiskError>;
