use std::path::PathBuf;
use std::time::Duration;

use crate::config::helpers::{optional_env, parse_bool_env, parse_secs_env};
use crate::error::ConfigError;

/// Dependency orchestration settings.
#[derive(Debug, Clone)]
pub struct DepsConfig {
    /// Shared network every dependency container joins.
    pub network_name: String,
    /// Driver used when the shared network has to be created.
    pub network_driver: String,
    /// Where the generated compose document is written.
    pub compose_file: PathBuf,
    /// Explicit compose invocation (e.g. `docker compose`). Probed when `None`.
    pub compose_command: Option<Vec<String>>,
    /// Use the compose path when the tool is available.
    pub prefer_compose: bool,
    pub compose_up_timeout: Duration,
    pub compose_down_timeout: Duration,
    /// Grace period handed to the runtime when stopping a container.
    pub stop_timeout: Duration,
    /// How long a freshly started service may take to report healthy.
    pub startup_health_timeout: Duration,
}

impl Default for DepsConfig {
    fn default() -> Self {
        Self {
            network_name: "brewctl-deps".to_string(),
            network_driver: "bridge".to_string(),
            compose_file: PathBuf::from("docker-compose.brewctl.yml"),
            compose_command: None,
            prefer_compose: true,
            compose_up_timeout: Duration::from_secs(300),
            compose_down_timeout: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(10),
            startup_health_timeout: Duration::from_secs(60),
        }
    }
}

impl DepsConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            network_name: optional_env("BREWCTL_NETWORK")?.unwrap_or(defaults.network_name),
            network_driver: optional_env("BREWCTL_NETWORK_DRIVER")?
                .unwrap_or(defaults.network_driver),
            compose_file: optional_env("BREWCTL_COMPOSE_FILE")?
                .map(PathBuf::from)
                .unwrap_or(defaults.compose_file),
            compose_command: optional_env("BREWCTL_COMPOSE_COMMAND")?
                .map(|s| s.split_whitespace().map(str::to_string).collect()),
            prefer_compose: parse_bool_env("BREWCTL_PREFER_COMPOSE", defaults.prefer_compose)?,
            compose_up_timeout: parse_secs_env(
                "BREWCTL_COMPOSE_UP_TIMEOUT_SECS",
                defaults.compose_up_timeout,
            )?,
            compose_down_timeout: parse_secs_env(
                "BREWCTL_COMPOSE_DOWN_TIMEOUT_SECS",
                defaults.compose_down_timeout,
            )?,
            stop_timeout: parse_secs_env("BREWCTL_STOP_TIMEOUT_SECS", defaults.stop_timeout)?,
            startup_health_timeout: parse_secs_env(
                "BREWCTL_STARTUP_HEALTH_TIMEOUT_SECS",
                defaults.startup_health_timeout,
            )?,
        })
    }
}
