//! Configuration module for the sweeper.
//!
//! The sweeper is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//!
//! [[retention.targets]]
//! path = "${MEDIA_ROOT}/recordings"
//! max_age_days = 14
//!
//! [schedule]
//! daily_at = "03:00"
//! ```

mod observability;
mod retention;
mod schedule;
mod state;

use std::path::Path;

pub use observability::*;
pub use retention::*;
pub use schedule::*;
use serde::{Deserialize, Serialize};
pub use state::*;

/// Root configuration for the sweeper.
///
/// All sections are optional with sensible defaults; an empty file is a
/// valid configuration that sweeps nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct SweeperConfig {
    /// Directories to sweep and how long to keep their files.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// When the background worker runs.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Where run summaries are persisted.
    #[serde(default)]
    pub state: StateConfig,

    /// Observability configuration (logging, metrics).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl SweeperConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: SweeperConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.retention.validate().map_err(ConfigError::Validation)?;
        self.schedule.validate().map_err(ConfigError::Validation)?;
        self.state.validate().map_err(ConfigError::Validation)?;
        self.observability
            .metrics
            .validate()
            .map_err(ConfigError::Validation)?;

        if self.retention.enabled && !self.retention.has_any_targets() {
            tracing::warn!(
                "Retention is enabled but no target directories are configured; \
                 scheduled sweeps will do nothing"
            );
        }

        Ok(())
    }

    /// Generate the JSON schema for the configuration file.
    #[cfg(feature = "json-schema")]
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SweeperConfig)
    }

    /// Generate the JSON schema as a pretty-printed JSON string.
    #[cfg(feature = "json-schema")]
    pub fn json_schema_string() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::json_schema())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Commented configuration written by `sweeper init`.
pub fn default_config_toml() -> &'static str {
    r#"# Sweeper configuration

[retention]
# Scheduled sweeps only run when enabled; `sweeper sweep` always runs.
enabled = false
# Honour per-target trigger_free_space_percent values.
enable_disk_threshold = false

# [[retention.targets]]
# path = "/srv/recordings"
# max_age_days = 14
# trigger_free_space_percent = 15

[retention.safety]
dry_run = false

[schedule]
daily_at = "03:00"
run_on_startup = false

[state]
max_history = 10

[observability.logging]
level = "info"
format = "compact"
"#
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| ConfigError::Validation(e.to_string()))?;
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
