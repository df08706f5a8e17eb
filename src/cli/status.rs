use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::runtime::{ContainerRecord, ContainerStatus};

/// One line per service: name, container, state, health and published ports.
pub fn render_status(records: &BTreeMap<String, ContainerRecord>) -> String {
    if records.is_empty() {
        return "No services configured".to_string();
    }

    let width = records.keys().map(String::len).max().unwrap_or(0);
    let mut out = String::new();
    for (service, record) in records {
        let state = match (&record.status, &record.error) {
            (ContainerStatus::Error, Some(error)) => format!("error ({})", error),
            (status, _) => status.to_string(),
        };
        let state = match &record.health {
            Some(health) => format!("{} ({})", state, health.status),
            None => state,
        };
        let _ = write!(out, "{:<width$}  {:<24} {}", service, record.name, state);
        if !record.ports.is_empty() {
            let ports: Vec<String> = record
                .ports
                .iter()
                .map(|(container, host)| format!("{} -> {}", host, container))
                .collect();
            let _ = write!(out, "  [{}]", ports.join(", "));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// `KEY=value` lines suitable for a `.env` file.
pub fn render_env(info: &BTreeMap<String, String>) -> String {
    info.iter()
        .map(|(key, value)| format!("{}={}\n", key, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    #[test]
    fn test_render_status_lines() {
        let mut records = BTreeMap::new();
        let mut ports = BTreeMap::new();
        ports.insert("5432/tcp".to_string(), "localhost:15432".to_string());
        records.insert(
            "database".to_string(),
            ContainerRecord::new("1", "brewctl-database", ContainerStatus::Running, "postgres:16")
                .with_ports(ports)
                .with_health(HealthStatus::healthy("pg_isready", "accepting connections")),
        );
        records.insert(
            "cache".to_string(),
            ContainerRecord::error("brewctl-cache", "daemon down"),
        );

        let text = render_status(&records);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("cache"));
        assert!(lines[0].contains("error (daemon down)"));
        assert!(lines[1].contains("running (healthy)"));
        assert!(lines[1].contains("localhost:15432 -> 5432/tcp"));
    }

    #[test]
    fn test_render_env() {
        let mut info = BTreeMap::new();
        info.insert("B".to_string(), "2".to_string());
        info.insert("A".to_string(), "1".to_string());
        assert_eq!(render_env(&info), "A=1\nB=2\n");
        assert_eq!(render_env(&BTreeMap::new()), "");
    }
}
