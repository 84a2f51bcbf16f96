use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use fs2::FileExt;

use super::error::{StateError, StateResult};

/// Exclusive advisory lock held for the duration of one sweep.
///
/// Released when dropped.
#[derive(Debug)]
pub struct SweepLock {
    file: File,
    path: PathBuf,
}

impl SweepLock {
    /// Lock file name, created next to the history file.
    pub const FILE_NAME: &'static str = "sweep.lock";

    /// Lock path for a given history file.
    pub fn path_for(history_path: &Path) -> PathBuf {
        history_path
            .parent()
            .map(|dir| dir.join(Self::FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(Self::FILE_NAME))
    }

    /// Try to take the lock without blocking.
    ///
    /// Fails with [`StateError::Locked`] if another process holds it.
    pub fn acquire(path: impl AsRef<Path>) -> StateResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        // Don't truncate before holding the lock; the holder's PID is in there
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                return Err(StateError::Locked(path));
            }
            Err(e) => return Err(e.into()),
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SweepLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = ?self.path, error = %e, "Failed to release sweep lock");
        }
    }
}
