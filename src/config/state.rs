use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where run summaries are persisted.
///
/// ```toml
/// [state]
/// path = "/var/lib/sweeper/last_run.json"
/// max_history = 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// History file. Defaults to `<data dir>/sweeper/last_run.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Number of run summaries kept, newest first.
    /// Default: 10
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_history: default_max_history(),
        }
    }
}

fn default_max_history() -> usize {
    10
}

impl StateConfig {
    /// The history file, falling back to the platform data directory.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("sweeper").join("last_run.json")))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_history == 0 {
            return Err("state.max_history must be at least 1".into());
        }
        Ok(())
    }
}
