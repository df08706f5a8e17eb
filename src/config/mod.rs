//! Runtime configuration.
//!
//! Every setting has a built-in default and can be overridden through a
//! `BREWCTL_*` environment variable (a `.env` file in the working
//! directory is loaded first). The dependency table and plugin manifests
//! are not part of this: they come from YAML documents, see
//! [`crate::deps::DependencyTable`] and [`crate::sync::PluginManifest`].

mod deps;
mod health;
pub(crate) mod helpers;
mod sync;

pub use deps::DepsConfig;
pub use health::HealthConfig;
pub use sync::{DEFAULT_IGNORE_PATTERNS, DEFAULT_WATCH_EXTENSIONS, SyncConfig};

use crate::error::ConfigError;

/// Complete brewctl configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub deps: DepsConfig,
    pub health: HealthConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Load `.env` if present and resolve every section from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            deps: DepsConfig::resolve()?,
            health: HealthConfig::resolve()?,
            sync: SyncConfig::resolve()?,
        })
    }
}
