use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// When the background worker runs.
///
/// ```toml
/// [schedule]
/// daily_at = "03:00"
/// run_on_startup = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "json-schema", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Local time of day for the daily sweep, as `HH:MM` or `HH:MM:SS`.
    /// Default: "03:00"
    #[serde(default = "default_daily_at")]
    pub daily_at: String,

    /// Run one sweep immediately when the worker starts.
    #[serde(default)]
    pub run_on_startup: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: default_daily_at(),
            run_on_startup: false,
        }
    }
}

fn default_daily_at() -> String {
    "03:00".to_string()
}

impl ScheduleConfig {
    /// Parse `daily_at` into a time of day.
    pub fn time_of_day(&self) -> Result<NaiveTime, String> {
        let raw = self.daily_at.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|_| {
                format!("schedule.daily_at '{raw}' is not a valid time of day (expected HH:MM)")
            })
    }

    pub fn validate(&self) -> Result<(), String> {
        self.time_of_day().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_three_am() {
        let config = ScheduleConfig::default();
        assert_eq!(
            config.time_of_day().unwrap(),
            NaiveTime::from_hms_opt(3, 0, 0).unwrap()
        );
        assert!(!config.run_on_startup);
    }

    #[test]
    fn test_parse_with_seconds() {
        let config = ScheduleConfig {
            daily_at: "23:15:30".into(),
            run_on_startup: true,
        };
        assert_eq!(
            config.time_of_day().unwrap(),
            NaiveTime::from_hms_opt(23, 15, 30).unwrap()
        );
    }

    #[test]
    fn test_invalid_time_rejected() {
        for raw in ["25:00", "3am", "", "12:61"] {
            let config = ScheduleConfig {
                daily_at: raw.into(),
                run_on_startup: false,
            };
            assert!(config.validate().is_err(), "{raw} should be rejected");
        }
    }
}
