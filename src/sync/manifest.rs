//! Plugin manifest and host → container mount mappings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name looked up in a plugin directory.
pub const MANIFEST_FILE: &str = "brewctl-plugin.yml";

/// Custom host → container mapping declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomMount {
    /// Relative to the plugin directory.
    pub host: PathBuf,
    /// Absolute path inside the container.
    pub container: String,
}

/// The parts of a plugin manifest the sync engine needs.
///
/// ```yaml
/// plugin:
///   name: coffee-tracker
///   version: 0.2.0
/// development:
///   source_paths: [src]
///   asset_paths: [assets]
///   mount_paths:
///     - host: config
///       container: /etc/brewctl/coffee-tracker
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub source_paths: Vec<PathBuf>,
    pub asset_paths: Vec<PathBuf>,
    pub mount_paths: Vec<CustomMount>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    plugin: RawPlugin,
    #[serde(default)]
    development: RawDevelopment,
}

#[derive(Debug, Deserialize)]
struct RawPlugin {
    name: String,
    #[serde(default = "default_version")]
    version: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawDevelopment {
    #[serde(default)]
    source_paths: Option<Vec<PathBuf>>,
    #[serde(default)]
    asset_paths: Option<Vec<PathBuf>>,
    #[serde(default)]
    mount_paths: Vec<CustomMount>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// One directory to mirror into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountMapping {
    pub host: PathBuf,
    pub container: String,
}

impl PluginManifest {
    /// Read `brewctl-plugin.yml` from `plugin_dir`.
    pub fn load(plugin_dir: &Path) -> Result<Self, ConfigError> {
        let path = plugin_dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw, &path.display().to_string())
    }

    pub fn from_yaml(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let parsed: RawManifest = serde_yml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;

        let name = parsed.plugin.name.trim().to_string();
        if name.is_empty() || name.contains('/') {
            return Err(ConfigError::InvalidValue {
                key: "plugin.name".to_string(),
                message: format!("'{}' is not a usable plugin name", parsed.plugin.name),
            });
        }
        if let Some(mount) = parsed
            .development
            .mount_paths
            .iter()
            .find(|m| !m.container.starts_with('/'))
        {
            return Err(ConfigError::InvalidValue {
                key: "development.mount_paths".to_string(),
                message: format!("container path '{}' must be absolute", mount.container),
            });
        }

        Ok(Self {
            name,
            version: parsed.plugin.version,
            source_paths: parsed
                .development
                .source_paths
                .unwrap_or_else(|| vec![PathBuf::from("src")]),
            asset_paths: parsed
                .development
                .asset_paths
                .unwrap_or_else(|| vec![PathBuf::from("assets")]),
            mount_paths: parsed.development.mount_paths,
        })
    }

    /// Directory holding this plugin inside the container.
    pub fn container_dir(&self, plugin_root: &str) -> String {
        format!("{}/{}", plugin_root.trim_end_matches('/'), self.name)
    }

    /// Source and asset directories plus custom mounts, resolved against
    /// `plugin_dir`. Host paths that do not exist are dropped.
    pub fn mount_mappings(&self, plugin_dir: &Path, plugin_root: &str) -> Vec<MountMapping> {
        let base = self.container_dir(plugin_root);

        let defaults = self
            .source_paths
            .iter()
            .chain(&self.asset_paths)
            .map(|rel| MountMapping {
                host: plugin_dir.join(rel),
                container: format!("{}/{}", base, rel.to_string_lossy().trim_matches('/')),
            });
        let custom = self.mount_paths.iter().map(|m| MountMapping {
            host: plugin_dir.join(&m.host),
            container: m.container.clone(),
        });

        defaults
            .chain(custom)
            .filter(|m| {
                let exists = m.host.exists();
                if !exists {
                    tracing::debug!(path = %m.host.display(), "Skipping missing mount source");
                }
                exists
            })
            .collect()
    }
}
