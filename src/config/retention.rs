//! Retention target configuration.
//!
//! Lists the directories to sweep, how long files are kept in each, and the
//! optional free-space trigger that gates a sweep on disk pressure.
//!
//! # Example
//!
//! ```toml
//! [retention]
//! enabled = true
//! enable_disk_threshold = true
//!
//! [[retention.targets]]
//! path = "/srv/recordings"
//! max_age_days = 14
//! trigger_free_space_percent = 15
//!
//! [[retention.targets]]
//! path = "/srv/transcodes"
//! max_age_days = 3
//!
//! [retention.safety]
//! dry_run = false
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Retention configuration.
///
/// When enabled, the background worker sweeps every target once a day and
/// deletes files whose modification time is older than the target's age.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Whether scheduled sweeping is enabled.
    /// Default: false (must be explicitly enabled). On-demand sweeps from the
    /// CLI run regardless.
    #[serde(default)]
    pub enabled: bool,

    /// Whether per-target free-space triggers are honoured.
    /// When false, `trigger_free_space_percent` is ignored and every target
    /// is swept unconditionally.
    #[serde(default)]
    pub enable_disk_threshold: bool,

    /// Directories to sweep, processed in the listed order.
    #[serde(default)]
    pub targets: Vec<RetentionTarget>,

    /// Safety settings to prevent accidental data loss.
    #[serde(default)]
    pub safety: RetentionSafety,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            enable_disk_threshold: false,
            targets: Vec::new(),
            safety: RetentionSafety::default(),
        }
    }
}

/// A single directory subject to retention sweeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionTarget {
    /// Directory to sweep. A blank path marks an unused slot and is skipped.
    #[serde(default)]
    pub path: String,

    /// Days to keep files. Values below 1 are treated as 1.
    /// Default: 30
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,

    /// Only sweep when the volume's free space is at or below this
    /// percentage. Clamped into 1..=100. Ignored unless
    /// `enable_disk_threshold` is set.
    #[serde(default)]
    pub trigger_free_space_percent: Option<i64>,
}

fn default_max_age_days() -> i64 {
    30
}

impl RetentionTarget {
    pub fn new(path: impl Into<String>, max_age_days: i64) -> Self {
        Self {
            path: path.into(),
            max_age_days,
            trigger_free_space_percent: None,
        }
    }

    pub fn with_trigger(mut self, percent: i64) -> Self {
        self.trigger_free_space_percent = Some(percent);
        self
    }

    /// Whether this slot names a directory at all.
    pub fn is_configured(&self) -> bool {
        !self.path.trim().is_empty()
    }

    /// Retention in days, never less than one.
    pub fn effective_max_age_days(&self) -> i64 {
        self.max_age_days.max(1)
    }

    /// Free-space trigger clamped into 1..=100.
    pub fn effective_trigger_percent(&self) -> Option<u8> {
        self.trigger_free_space_percent
            .map(|percent| percent.clamp(1, 100) as u8)
    }
}

/// Safety settings for retention sweeps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct RetentionSafety {
    /// If true, log what would be deleted without actually deleting.
    /// Useful for testing retention policies.
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

impl RetentionConfig {
    /// Check if any target names a directory.
    pub fn has_any_targets(&self) -> bool {
        self.targets.iter().any(RetentionTarget::is_configured)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        for target in self.targets.iter().filter(|t| t.is_configured()) {
            let key = target.path.trim();
            if !seen.insert(key) {
                tracing::warn!(
                    path = %key,
                    "Retention target is listed more than once, it will be swept once per entry"
                );
            }
            if target.max_age_days < 1 {
                tracing::warn!(
                    path = %key,
                    max_age_days = target.max_age_days,
                    "Retention below one day is not permitted, using 1 day"
                );
            }
            if let Some(percent) = target.trigger_free_space_percent
                && !(1..=100).contains(&percent)
            {
                tracing::warn!(
                    path = %key,
                    trigger_free_space_percent = percent,
                    "Free-space trigger outside 1..=100 will be clamped"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetentionConfig::default();
        assert!(!config.enabled);
        assert!(!config.enable_disk_threshold);
        assert!(config.targets.is_empty());
        assert!(!config.safety.dry_run);
        assert!(!config.has_any_targets());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            enabled = true
            enable_disk_threshold = true

            [[targets]]
            path = "/srv/recordings"
            max_age_days = 14
            trigger_free_space_percent = 15

            [[targets]]
            path = "/srv/transcodes"

            [safety]
            dry_run = true
        "#;
        let config: RetentionConfig = toml::from_str(toml).unwrap();
        assert!(config.enabled);
        assert!(config.enable_disk_threshold);
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].max_age_days, 14);
        assert_eq!(config.targets[0].trigger_free_space_percent, Some(15));
        assert_eq!(config.targets[1].max_age_days, 30);
        assert_eq!(config.targets[1].trigger_free_space_percent, None);
        assert!(config.safety.dry_run);
    }

    #[test]
    fn test_effective_values_are_clamped() {
        assert_eq!(RetentionTarget::new("/a", 0).effective_max_age_days(), 1);
        assert_eq!(RetentionTarget::new("/a", -7).effective_max_age_days(), 1);
        assert_eq!(RetentionTarget::new("/a", 9).effective_max_age_days(), 9);

        let target = RetentionTarget::new("/a", 1);
        assert_eq!(target.clone().with_trigger(0).effective_trigger_percent(), Some(1));
        assert_eq!(target.clone().with_trigger(250).effective_trigger_percent(), Some(100));
        assert_eq!(target.clone().with_trigger(40).effective_trigger_percent(), Some(40));
        assert_eq!(target.effective_trigger_percent(), None);
    }

    #[test]
    fn test_blank_path_is_unconfigured() {
        assert!(!RetentionTarget::new("", 5).is_configured());
        assert!(!RetentionTarget::new("   ", 5).is_configured());
        assert!(RetentionTarget::new("/tmp", 5).is_configured());
    }

    #[test]
    fn test_duplicate_targets_accepted() {
        let config = RetentionConfig {
            targets: vec![
                RetentionTarget::new("/srv/a", 3),
                RetentionTarget::new("/srv/a ", 5),
            ],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_slots_do_not_count_as_duplicates() {
        let config = RetentionConfig {
            targets: vec![RetentionTarget::new("", 3), RetentionTarget::new(" ", 3)],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_target_field_rejected() {
        let toml = r#"
            [[targets]]
            path = "/srv/a"
            days = 3
        "#;
        assert!(toml::from_str::<RetentionConfig>(toml).is_err());
    }
}
