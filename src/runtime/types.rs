//! Runtime-observed container state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::health::{HealthStatus, HealthStrategy};
use crate::runtime::service::normalize_port_key;

/// Lifecycle state reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Running,
    Exited,
    Paused,
    Created,
    Restarting,
    Dead,
    NotFound,
    Error,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Running => "running",
            ContainerStatus::Exited => "exited",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Created => "created",
            ContainerStatus::Restarting => "restarting",
            ContainerStatus::Dead => "dead",
            ContainerStatus::NotFound => "not_found",
            ContainerStatus::Error => "error",
        }
    }

    /// Map the runtime's state string. `removing` is treated as dead.
    pub fn from_runtime(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "running" => ContainerStatus::Running,
            "exited" => ContainerStatus::Exited,
            "paused" => ContainerStatus::Paused,
            "created" => ContainerStatus::Created,
            "restarting" => ContainerStatus::Restarting,
            "dead" | "removing" => ContainerStatus::Dead,
            _ => ContainerStatus::Error,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ContainerStatus::Running)
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health state maintained by the runtime for containers with a declared check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredHealth {
    /// Raw runtime status (`healthy`, `starting`, ...).
    pub status: String,
    /// Output of the most recent check run.
    pub last_output: Option<String>,
}

/// Snapshot of one container. Always built fresh from the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    pub image: String,
    /// Container port (`5432/tcp`) to host address (`localhost:15432`).
    pub ports: BTreeMap<String, String>,
    pub networks: Vec<String>,
    /// Present when the container carries a declared health check.
    pub declared_health: Option<DeclaredHealth>,
    /// Strategy selected when the record was built.
    pub strategy: HealthStrategy,
    /// Last evaluated health, when a report attached one.
    pub health: Option<HealthStatus>,
    /// Lookup failure, for `not_found` and `error` records.
    pub error: Option<String>,
}

impl ContainerRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        status: ContainerStatus,
        image: impl Into<String>,
    ) -> Self {
        let image = image.into();
        Self {
            id: id.into(),
            name: name.into(),
            status,
            strategy: HealthStrategy::select(false, &image),
            image,
            ports: BTreeMap::new(),
            networks: Vec::new(),
            declared_health: None,
            health: None,
            error: None,
        }
    }

    /// Record for a name the runtime does not know.
    pub fn not_found(name: impl Into<String>) -> Self {
        let mut record = Self::new("", name, ContainerStatus::NotFound, "");
        record.error = Some("Container not found".to_string());
        record
    }

    /// Record for a lookup that failed.
    pub fn error(name: impl Into<String>, error: impl std::fmt::Display) -> Self {
        let mut record = Self::new("", name, ContainerStatus::Error, "");
        record.error = Some(error.to_string());
        record
    }

    pub fn with_ports(mut self, ports: BTreeMap<String, String>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_networks(mut self, networks: Vec<String>) -> Self {
        self.networks = networks;
        self
    }

    /// Attach runtime health state; switches the strategy to `Declared`.
    pub fn with_declared_health(mut self, health: DeclaredHealth) -> Self {
        self.declared_health = Some(health);
        self.strategy = HealthStrategy::select(true, &self.image);
        self
    }

    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = Some(health);
        self
    }

    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Host port published for a container port (`5432` or `5432/tcp`).
    pub fn host_port(&self, container_port: &str) -> Option<u16> {
        let address = self.ports.get(&normalize_port_key(container_port))?;
        address.rsplit(':').next()?.parse().ok()
    }
}

/// Output of a command run inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i64,
    /// Combined stdout and stderr.
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ProbeKind;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ContainerStatus::from_runtime("running"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::from_runtime("EXITED"), ContainerStatus::Exited);
        assert_eq!(ContainerStatus::from_runtime("removing"), ContainerStatus::Dead);
        assert_eq!(ContainerStatus::from_runtime(""), ContainerStatus::Error);
    }

    #[test]
    fn test_strategy_cached_on_record() {
        let record = ContainerRecord::new("abc", "brewctl-db", ContainerStatus::Running, "postgres:16");
        assert_eq!(
            record.strategy,
            HealthStrategy::ReadinessProbe(ProbeKind::Postgres)
        );

        let declared = record.with_declared_health(DeclaredHealth {
            status: "starting".to_string(),
            last_output: None,
        });
        assert_eq!(declared.strategy, HealthStrategy::Declared);
    }

    #[test]
    fn test_host_port_lookup() {
        let mut ports = BTreeMap::new();
        ports.insert("5432/tcp".to_string(), "localhost:15432".to_string());
        let record = ContainerRecord::new("abc", "db", ContainerStatus::Running, "postgres")
            .with_ports(ports);

        assert_eq!(record.host_port("5432"), Some(15432));
        assert_eq!(record.host_port("5432/tcp"), Some(15432));
        assert_eq!(record.host_port("6379"), None);
    }

    #[test]
    fn test_not_found_record() {
        let record = ContainerRecord::not_found("ghost");
        assert_eq!(record.status, ContainerStatus::NotFound);
        assert!(record.error.is_some());
        assert!(!record.is_running());
    }
}
