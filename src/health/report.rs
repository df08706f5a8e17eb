//! Plain-text health reports for terminal display.

use std::fmt::Write as _;

use crate::health::monitor::HealthAlert;
use crate::health::status::HealthState;
use crate::health::summary::HealthSummary;

/// Renders summaries and alerts as text.
#[derive(Debug, Default, Clone, Copy)]
pub struct HealthReporter;

impl HealthReporter {
    pub fn status_report(&self, summary: &HealthSummary) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Dependency Health Report");
        let _ = writeln!(out, "{}", "=".repeat(40));
        let _ = writeln!(out, "Timestamp: {}", summary.timestamp.to_rfc3339());
        let _ = writeln!(
            out,
            "Overall Status: {}",
            summary.overall.as_str().to_uppercase()
        );
        let _ = writeln!(out);

        let _ = writeln!(
            out,
            "Container Summary: {}/{} healthy",
            summary.count(HealthState::Healthy),
            summary.total
        );
        for (state, label) in [
            (HealthState::Unhealthy, "Unhealthy"),
            (HealthState::Starting, "Starting"),
            (HealthState::Error, "Errors"),
        ] {
            let count = summary.count(state);
            if count > 0 {
                let _ = writeln!(out, "  {}: {}", label, count);
            }
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Container Details:");
        for (name, health) in &summary.containers {
            let _ = writeln!(
                out,
                "  [{}] {}: {} ({})",
                status_icon(health.status),
                name,
                health.status,
                health.method
            );
            if let Some(details) = &health.details {
                let _ = writeln!(out, "      Details: {}", details);
            } else if let Some(error) = &health.error {
                let _ = writeln!(out, "      Error: {}", error);
            }
        }

        out.trim_end().to_string()
    }

    pub fn failure_alert(&self, alert: &HealthAlert) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "HEALTH ALERT: Container Failure Detected");
        let _ = writeln!(out, "{}", "=".repeat(45));
        let _ = writeln!(out, "Container: {}", alert.container_name);
        let _ = writeln!(out, "Status: {}", alert.health.status);
        let _ = writeln!(out, "Consecutive Failures: {}", alert.failure_count);
        let _ = writeln!(out, "Timestamp: {}", alert.timestamp.to_rfc3339());
        let _ = writeln!(out);

        if let Some(details) = &alert.health.details {
            let _ = writeln!(out, "Details: {}", details);
        }
        if let Some(error) = &alert.health.error {
            let _ = writeln!(out, "Error: {}", error);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Recommended Actions:");
        let _ = writeln!(out, "  1. Check container logs: brewctl logs <service>");
        let _ = writeln!(out, "  2. Restart the container if needed");
        let _ = writeln!(out, "  3. Verify service configuration");

        out.trim_end().to_string()
    }
}

fn status_icon(state: HealthState) -> &'static str {
    match state {
        HealthState::Healthy => "OK",
        HealthState::Unhealthy => "FAIL",
        HealthState::Starting => "WAIT",
        HealthState::Error => "ERR",
        HealthState::NoHealthcheck | HealthState::Unknown => "???",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;
    use chrono::Utc;

    #[test]
    fn test_status_report_lists_containers() {
        let summary = HealthSummary::from_statuses([
            (
                "brewctl-database".to_string(),
                HealthStatus::healthy("pg_isready", "PostgreSQL is ready for connections"),
            ),
            (
                "brewctl-rabbitmq".to_string(),
                HealthStatus::error("rabbitmq_diagnostics", "exec failed"),
            ),
        ]);
        let report = HealthReporter.status_report(&summary);
        assert!(report.contains("Overall Status: DEGRADED"));
        assert!(report.contains("Container Summary: 1/2 healthy"));
        assert!(report.contains("  Errors: 1"));
        assert!(report.contains("[OK] brewctl-database: healthy (pg_isready)"));
        assert!(report.contains("      Error: exec failed"));
    }

    #[test]
    fn test_failure_alert_text() {
        let alert = HealthAlert {
            container_name: "brewctl-mongodb".to_string(),
            health: HealthStatus::unhealthy("mongosh_ping", "connection refused"),
            failure_count: 3,
            timestamp: Utc::now(),
        };
        let text = HealthReporter.failure_alert(&alert);
        assert!(text.starts_with("HEALTH ALERT"));
        assert!(text.contains("Consecutive Failures: 3"));
        assert!(text.contains("Details: connection refused"));
        assert!(!text.contains("Error:"));
    }
}
