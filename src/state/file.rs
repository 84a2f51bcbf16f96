use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::{
    error::{StateError, StateResult},
    traits::RunHistory,
};
use crate::retention::RunSummary;

/// On-disk layout of the history file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    /// Newest first.
    #[serde(default)]
    runs: Vec<RunSummary>,
}

/// File-backed run history.
///
/// Keeps every summary in one JSON file, newest first, trimmed to
/// `max_history` entries. Writes go to a sibling temp file that is then
/// renamed over the original, so readers never see a half-written file.
///
/// Several processes may share one file (a `serve` worker and a one-off
/// `sweep`). Each record re-reads the file under an exclusive lock on
/// `<file>.lock` before writing, and reads always go to disk.
pub struct FileRunHistory {
    path: PathBuf,
    max_history: usize,
}

impl FileRunHistory {
    /// Open the history at `path`, creating its directory if needed.
    pub async fn new(path: impl AsRef<Path>, max_history: usize) -> StateResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let runs = load_from_disk(&path).await?;
        tracing::debug!(path = ?path, runs = runs.len(), "Loaded run history");

        Ok(Self {
            path,
            max_history: max_history.max(1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn load_from_disk(path: &Path) -> StateResult<Vec<RunSummary>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => parse_runs(&contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn parse_runs(contents: &str) -> StateResult<Vec<RunSummary>> {
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let file: HistoryFile =
        serde_json::from_str(contents).map_err(|e| StateError::Deserialization(e.to_string()))?;
    Ok(file.runs)
}

fn lock_path(path: &Path) -> PathBuf {
    path.with_extension("json.lock")
}

/// Prepend `summary` to the runs currently on disk and write them back,
/// holding the history lock throughout. Returns the runs as written.
fn append_locked(
    path: &Path,
    summary: RunSummary,
    max_history: usize,
) -> StateResult<Vec<RunSummary>> {
    let lock = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path(path))?;
    lock.lock_exclusive()?;

    let result = append(path, summary, max_history);

    if let Err(e) = FileExt::unlock(&lock) {
        tracing::warn!(path = ?path, error = %e, "Failed to release history lock");
    }
    result
}

fn append(path: &Path, summary: RunSummary, max_history: usize) -> StateResult<Vec<RunSummary>> {
    let mut runs = match std::fs::read_to_string(path) {
        Ok(contents) => parse_runs(&contents)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    runs.insert(0, summary);
    runs.truncate(max_history);

    let file = HistoryFile { runs };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| StateError::Serialization(e.to_string()))?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(file.runs)
}

#[async_trait]
impl RunHistory for FileRunHistory {
    async fn record(&self, summary: &RunSummary) -> StateResult<()> {
        let path = self.path.clone();
        let max_history = self.max_history;
        let summary = summary.clone();

        let runs = tokio::task::spawn_blocking(move || append_locked(&path, summary, max_history))
            .await
            .map_err(|e| StateError::Io(std::io::Error::other(e.to_string())))??;

        tracing::debug!(path = ?self.path, runs = runs.len(), "Recorded run summary");
        Ok(())
    }

    async fn last_run(&self) -> StateResult<Option<RunSummary>> {
        Ok(load_from_disk(&self.path).await?.into_iter().next())
    }

    async fn history(&self, limit: usize) -> StateResult<Vec<RunSummary>> {
        let mut runs = load_from_disk(&self.path).await?;
        runs.truncate(limit);
        Ok(runs)
    }
}
