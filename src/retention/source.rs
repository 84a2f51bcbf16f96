use std::path::{Path, PathBuf};

use super::error::{SourceError, SourceResult};
use crate::config::{ConfigError, RetentionConfig, RetentionTarget, SweeperConfig};

/// Where a sweep gets its targets from.
///
/// A sweep calls [`load`](RetentionSource::load) exactly once at start, so an
/// implementation may re-read its backing store every time.
pub trait RetentionSource: Send + Sync {
    fn load(&self) -> SourceResult<RetentionConfig>;

    fn targets(&self) -> SourceResult<Vec<RetentionTarget>> {
        self.load().map(|config| config.targets)
    }

    fn disk_threshold_enabled(&self) -> SourceResult<bool> {
        self.load().map(|config| config.enable_disk_threshold)
    }
}

impl RetentionSource for RetentionConfig {
    fn load(&self) -> SourceResult<RetentionConfig> {
        Ok(self.clone())
    }
}

/// Reads the `[retention]` section from a config file on every sweep, so
/// target edits take effect without a restart.
#[derive(Debug, Clone)]
pub struct ConfigFileSource {
    path: PathBuf,
}

impl ConfigFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RetentionSource for ConfigFileSource {
    fn load(&self) -> SourceResult<RetentionConfig> {
        match SweeperConfig::from_file(&self.path) {
            Ok(config) => Ok(config.retention),
            Err(ConfigError::Io(e, path)) if e.kind() == std::io::ErrorKind::NotFound => Err(
                SourceError::Unavailable(format!("{} does not exist", path.display())),
            ),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_source() {
        let config = RetentionConfig {
            enable_disk_threshold: true,
            targets: vec![RetentionTarget::new("/srv/a", 2)],
            ..Default::default()
        };
        assert_eq!(config.targets().unwrap().len(), 1);
        assert!(config.disk_threshold_enabled().unwrap());
    }

    #[test]
    fn test_file_source_rereads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweeper.toml");
        std::fs::write(&path, "[[retention.targets]]\npath = \"/srv/a\"\n").unwrap();

        let source = ConfigFileSource::new(&path);
        assert_eq!(source.targets().unwrap().len(), 1);

        std::fs::write(
            &path,
            "[retention]\nenable_disk_threshold = true\n\n\
             [[retention.targets]]\npath = \"/srv/a\"\n\n\
             [[retention.targets]]\npath = \"/srv/b\"\n",
        )
        .unwrap();
        assert_eq!(source.targets().unwrap().len(), 2);
        assert!(source.disk_threshold_enabled().unwrap());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = ConfigFileSource::new(dir.path().join("absent.toml"));
        assert!(matches!(source.load(), Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn test_broken_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweeper.toml");
        std::fs::write(&path, "[retention\n").unwrap();
        let source = ConfigFileSource::new(&path);
        assert!(matches!(source.load(), Err(SourceError::Config(_))));
    }
}
