//! Service definitions and profiles loaded from the dependency table.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::runtime::ServiceDefinition;

/// `{services, profiles}` as handed over by the configuration layer.
///
/// ```yaml
/// services:
///   database:
///     image: postgres:16
///     ports: ["5432:5432"]
/// profiles:
///   plugin-dev: [database]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTable {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceDefinition>,
    /// Profile name to ordered service names.
    #[serde(default)]
    pub profiles: BTreeMap<String, Vec<String>>,
}

impl DependencyTable {
    /// Read and validate a YAML dependency table.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&raw, &path.display().to_string())
    }

    /// Parse a YAML document. `origin` names the source in errors.
    pub fn from_yaml(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let table: DependencyTable =
            serde_yml::from_str(raw).map_err(|e| ConfigError::Parse {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;
        table.validated()
    }

    /// Build a table in code, applying the same checks as loading.
    pub fn new(
        services: impl IntoIterator<Item = (String, ServiceDefinition)>,
        profiles: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> Result<Self, ConfigError> {
        Self {
            services: services.into_iter().collect(),
            profiles: profiles.into_iter().collect(),
        }
        .validated()
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        let known: BTreeSet<String> = self.services.keys().cloned().collect();

        for (name, service) in self.services.iter_mut() {
            service.name = name.clone();
            service
                .image_source()
                .and_then(|_| service.command_argv())
                .map_err(|e| ConfigError::InvalidService {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            for dep in &service.depends_on {
                if !known.contains(dep) {
                    tracing::warn!(service = %name, "depends_on references unknown service '{}'", dep);
                }
            }
        }

        // Unknown profile members fail when that profile is started.
        for (profile, members) in &self.profiles {
            for missing in members.iter().filter(|m| !known.contains(*m)) {
                tracing::warn!(profile = %profile, "Profile lists unconfigured service '{}'", missing);
            }
        }

        Ok(self)
    }

    pub fn service(&self, name: &str) -> Result<&ServiceDefinition, ConfigError> {
        self.services
            .get(name)
            .ok_or_else(|| ConfigError::UnknownService(name.to_string()))
    }

    /// Services of a profile in declared order.
    pub fn resolve_profile(&self, profile: &str) -> Result<Vec<&ServiceDefinition>, ConfigError> {
        let members = self
            .profiles
            .get(profile)
            .ok_or_else(|| ConfigError::UnknownProfile(profile.to_string()))?;
        self.resolve_services(members)
    }

    /// Look up every name before returning anything.
    pub fn resolve_services<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<&ServiceDefinition>, ConfigError> {
        names.iter().map(|n| self.service(n.as_ref())).collect()
    }

    /// Container names of every configured service.
    pub fn container_names(&self) -> Vec<String> {
        self.services
            .values()
            .map(ServiceDefinition::container_name)
            .collect()
    }
}
