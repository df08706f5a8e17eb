use std::time::Duration;

use crate::config::helpers::{parse_nonzero_secs_env, parse_optional_env, parse_secs_env};
use crate::error::ConfigError;

/// Health evaluation and monitoring settings.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Time between monitor ticks.
    pub check_interval: Duration,
    /// Consecutive failures that fire an alert.
    pub alert_threshold: u32,
    /// Capacity of the snapshot history ring.
    pub history_capacity: usize,
    /// Poll period used by `wait_for_healthy`.
    pub poll_interval: Duration,
    /// Upper bound on a single strategy evaluation.
    pub evaluation_timeout: Duration,
    /// How long `stop_monitoring` waits for the loop to exit.
    pub join_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            alert_threshold: 3,
            history_capacity: 100,
            poll_interval: Duration::from_secs(2),
            evaluation_timeout: Duration::from_secs(30),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl HealthConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let alert_threshold =
            parse_optional_env("BREWCTL_ALERT_THRESHOLD", defaults.alert_threshold)?;
        if alert_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BREWCTL_ALERT_THRESHOLD".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            check_interval: parse_nonzero_secs_env(
                "BREWCTL_HEALTH_INTERVAL_SECS",
                defaults.check_interval,
            )?,
            alert_threshold,
            history_capacity: parse_optional_env(
                "BREWCTL_HEALTH_HISTORY",
                defaults.history_capacity,
            )?,
            poll_interval: parse_nonzero_secs_env(
                "BREWCTL_HEALTH_POLL_SECS",
                defaults.poll_interval,
            )?,
            evaluation_timeout: parse_secs_env(
                "BREWCTL_HEALTH_EVAL_TIMEOUT_SECS",
                defaults.evaluation_timeout,
            )?,
            join_timeout: parse_secs_env(
                "BREWCTL_MONITOR_JOIN_TIMEOUT_SECS",
                defaults.join_timeout,
            )?,
        })
    }
}
