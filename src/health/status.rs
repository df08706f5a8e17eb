//! Health verdict types.

use serde::{Deserialize, Serialize};

/// Verdict category produced by one strategy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Starting,
    NoHealthcheck,
    Unknown,
    Error,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Starting => "starting",
            HealthState::NoHealthcheck => "no_healthcheck",
            HealthState::Unknown => "unknown",
            HealthState::Error => "error",
        }
    }

    /// States that count toward the monitor's consecutive-failure counter.
    pub fn is_failure(&self) -> bool {
        matches!(self, HealthState::Unhealthy | HealthState::Error)
    }

    /// Map a runtime-reported health string.
    pub fn from_runtime(status: &str) -> Self {
        match status {
            "healthy" => HealthState::Healthy,
            "unhealthy" => HealthState::Unhealthy,
            "starting" => HealthState::Starting,
            "none" => HealthState::NoHealthcheck,
            _ => HealthState::Unknown,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    /// Which check produced the verdict (`pg_isready`, `builtin`, ...).
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn new(status: HealthState, method: impl Into<String>) -> Self {
        Self {
            status,
            method: method.into(),
            details: None,
            error: None,
        }
    }

    pub fn healthy(method: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(HealthState::Healthy, method).with_details(details)
    }

    pub fn unhealthy(method: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(HealthState::Unhealthy, method).with_details(details)
    }

    /// Internal failure captured as a value.
    pub fn error(method: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: HealthState::Error,
            method: method.into(),
            details: None,
            error: Some(error.into()),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }

    /// Details, else error text, for one-line displays.
    pub fn summary_text(&self) -> Option<&str> {
        self.details.as_deref().or(self.error.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_mapping() {
        assert_eq!(HealthState::from_runtime("healthy"), HealthState::Healthy);
        assert_eq!(HealthState::from_runtime("none"), HealthState::NoHealthcheck);
        assert_eq!(HealthState::from_runtime("weird"), HealthState::Unknown);
    }

    #[test]
    fn test_failure_states() {
        assert!(HealthState::Unhealthy.is_failure());
        assert!(HealthState::Error.is_failure());
        assert!(!HealthState::Starting.is_failure());
        assert!(!HealthState::Unknown.is_failure());
    }

    #[test]
    fn test_serialized_shape() {
        let status = HealthStatus::error("pg_isready", "exec failed");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "exec failed");
        assert!(json.get("details").is_none());
    }
}
