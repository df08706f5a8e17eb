//! Health strategy selection.
//!
//! A strategy is chosen once per container record: a declared health check
//! wins, then the image identity, then the generic exec probe.

use serde::{Deserialize, Serialize};

/// Image-specific readiness probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Postgres,
    Mongo,
    RabbitMq,
    Keycloak,
}

impl ProbeKind {
    /// Match an image reference against the known identities.
    pub fn from_image(image: &str) -> Option<Self> {
        let image = image.to_ascii_lowercase();
        if image.contains("postgres") {
            Some(ProbeKind::Postgres)
        } else if image.contains("mongo") {
            Some(ProbeKind::Mongo)
        } else if image.contains("rabbitmq") {
            Some(ProbeKind::RabbitMq)
        } else if image.contains("keycloak") {
            Some(ProbeKind::Keycloak)
        } else {
            None
        }
    }

    /// Value reported in `HealthStatus::method`.
    pub fn method(&self) -> &'static str {
        match self {
            ProbeKind::Postgres => "pg_isready",
            ProbeKind::Mongo => "mongosh_ping",
            ProbeKind::RabbitMq => "rabbitmq_diagnostics",
            ProbeKind::Keycloak => "http_health_check",
        }
    }

    /// Command run inside the container, `None` for HTTP probes.
    pub fn exec_command(&self) -> Option<Vec<String>> {
        let argv: &[&str] = match self {
            ProbeKind::Postgres => &["pg_isready", "-U", "postgres"],
            ProbeKind::Mongo => &["mongosh", "--eval", "db.runCommand(\"ping\").ok", "--quiet"],
            ProbeKind::RabbitMq => &["rabbitmq-diagnostics", "ping"],
            ProbeKind::Keycloak => return None,
        };
        Some(argv.iter().map(|s| s.to_string()).collect())
    }

    /// Human-readable readiness message for a passing probe.
    pub fn ready_message(&self) -> &'static str {
        match self {
            ProbeKind::Postgres => "PostgreSQL is ready for connections",
            ProbeKind::Mongo => "MongoDB is responding to ping",
            ProbeKind::RabbitMq => "RabbitMQ is responding to ping",
            ProbeKind::Keycloak => "Keycloak health endpoint responding",
        }
    }
}

/// How a container's health is determined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "probe")]
pub enum HealthStrategy {
    /// The runtime runs a declared health check; read its verdict.
    Declared,
    /// Image-specific readiness probe.
    ReadinessProbe(ProbeKind),
    /// Running + trivial command execution.
    #[default]
    GenericExec,
}

impl HealthStrategy {
    pub fn select(has_declared_check: bool, image: &str) -> Self {
        if has_declared_check {
            return HealthStrategy::Declared;
        }
        match ProbeKind::from_image(image) {
            Some(kind) => HealthStrategy::ReadinessProbe(kind),
            None => HealthStrategy::GenericExec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_wins_over_image() {
        assert_eq!(
            HealthStrategy::select(true, "postgres:16"),
            HealthStrategy::Declared
        );
    }

    #[test]
    fn test_image_heuristics() {
        assert_eq!(
            HealthStrategy::select(false, "docker.io/library/postgres:16-alpine"),
            HealthStrategy::ReadinessProbe(ProbeKind::Postgres)
        );
        assert_eq!(
            HealthStrategy::select(false, "mongo:7"),
            HealthStrategy::ReadinessProbe(ProbeKind::Mongo)
        );
        assert_eq!(
            HealthStrategy::select(false, "rabbitmq:3-management"),
            HealthStrategy::ReadinessProbe(ProbeKind::RabbitMq)
        );
        assert_eq!(
            HealthStrategy::select(false, "quay.io/keycloak/keycloak:24"),
            HealthStrategy::ReadinessProbe(ProbeKind::Keycloak)
        );
        assert_eq!(
            HealthStrategy::select(false, "redis:7"),
            HealthStrategy::GenericExec
        );
    }

    #[test]
    fn test_probe_commands() {
        assert_eq!(
            ProbeKind::Postgres.exec_command().unwrap(),
            vec!["pg_isready", "-U", "postgres"]
        );
        assert!(ProbeKind::Keycloak.exec_command().is_none());
    }
}
