use std::time::Duration;

use crate::config::helpers::{optional_env, parse_optional_env, parse_secs_env};
use crate::error::ConfigError;

/// Extensions that trigger a sync when changed.
pub const DEFAULT_WATCH_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "css", "scss", "html", "json", "yml", "yaml",
];

/// Path components and file patterns that never sync.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "__pycache__",
    "*.pyc",
    "*.pyo",
    ".git",
    ".vscode",
    ".idea",
    "node_modules",
    "dist",
    "build",
    ".DS_Store",
    "Thumbs.db",
];

/// Live sync settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum gap between accepted events for one registration.
    pub debounce: Duration,
    /// Directory inside the container that holds every plugin.
    pub plugin_root: String,
    /// Container that receives synced files by default.
    pub core_container: String,
    /// `pkill -f` pattern that identifies the reloadable process.
    pub reload_pattern: String,
    pub watch_extensions: Vec<String>,
    pub ignore_patterns: Vec<String>,
    /// How long `stop` waits for a watch task to exit.
    pub join_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            plugin_root: "/plugins".to_string(),
            core_container: "brewctl-core".to_string(),
            reload_pattern: "brewctl.*core".to_string(),
            watch_extensions: DEFAULT_WATCH_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl SyncConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let debounce_ms = parse_optional_env(
            "BREWCTL_SYNC_DEBOUNCE_MS",
            defaults.debounce.as_millis() as u64,
        )?;

        Ok(Self {
            debounce: Duration::from_millis(debounce_ms),
            plugin_root: optional_env("BREWCTL_PLUGIN_ROOT")?
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.plugin_root),
            core_container: optional_env("BREWCTL_CORE_CONTAINER")?
                .unwrap_or(defaults.core_container),
            reload_pattern: optional_env("BREWCTL_RELOAD_PATTERN")?
                .unwrap_or(defaults.reload_pattern),
            watch_extensions: defaults.watch_extensions,
            ignore_patterns: defaults.ignore_patterns,
            join_timeout: parse_secs_env(
                "BREWCTL_SYNC_JOIN_TIMEOUT_SECS",
                defaults.join_timeout,
            )?,
        })
    }
}
