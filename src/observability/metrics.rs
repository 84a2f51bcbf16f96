//! Prometheus metrics for the sweeper.
//!
//! Provides metrics for:
//! - Files deleted per target
//! - Per-file and enumeration failures
//! - Sweep runs, their duration and last completion time
//!
//! Without the `prometheus` feature every recording function is a no-op.

#[cfg(feature = "prometheus")]
use std::net::SocketAddr;

#[cfg(feature = "prometheus")]
use metrics::{counter, gauge, histogram};
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;

/// Initialize the metrics system with the given configuration.
///
/// Starts the Prometheus scrape listener on `listen_address`. Must be called
/// from within a Tokio runtime.
#[cfg(feature = "prometheus")]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .listen_address
        .parse()
        .map_err(|e| MetricsError::Setup(format!("invalid listen address: {e}")))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Suffix("_duration_seconds".to_string()),
            &[0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0],
        )
        .map_err(|e| MetricsError::Setup(e.to_string()))?
        .install()
        .map_err(MetricsError::Install)?;

    tracing::info!(address = %addr, "Prometheus metrics listener started");
    Ok(())
}

/// Initialize the metrics system (no-op without prometheus feature).
#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    if config.enabled {
        tracing::warn!("Metrics enabled but the 'prometheus' feature is not compiled in");
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Metric Recording Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Record files deleted from one retention target.
///
/// # Arguments
/// * `target` - The configured target directory
/// * `count` - The number of files deleted
pub fn record_retention_deletion(target: &str, count: u64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "sweeper_retention_deletions_total",
            "target" => target.to_string()
        )
        .increment(count);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (target, count);
    }
}

/// Record a recoverable retention failure.
///
/// `kind` is "delete" for a single file or "enumerate" for a whole target.
pub fn record_retention_error(kind: &str) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "sweeper_retention_errors_total",
            "kind" => kind.to_string()
        )
        .increment(1);
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = kind;
    }
}

/// Record a finished sweep.
///
/// # Arguments
/// * `outcome` - "completed", "cancelled" or "failed"
/// * `duration_secs` - Wall-clock time of the sweep
pub fn record_sweep_run(outcome: &str, duration_secs: f64) {
    #[cfg(feature = "prometheus")]
    {
        counter!(
            "sweeper_sweep_runs_total",
            "outcome" => outcome.to_string()
        )
        .increment(1);
        histogram!("sweeper_sweep_duration_seconds").record(duration_secs);
        if outcome == "completed" {
            gauge!("sweeper_last_sweep_timestamp_seconds")
                .set(chrono::Utc::now().timestamp() as f64);
        }
    }
    #[cfg(not(feature = "prometheus"))]
    {
        let _ = (outcome, duration_secs);
    }
}

/// Metrics errors.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to set up metrics: {0}")]
    Setup(String),

    #[cfg(feature = "prometheus")]
    #[error("Failed to install metrics recorder: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}
