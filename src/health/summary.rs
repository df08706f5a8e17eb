//! Aggregate health across a container set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::status::{HealthState, HealthStatus};

/// Overall verdict for a set of containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Unhealthy,
    Starting,
    Degraded,
    Unknown,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Unhealthy => "unhealthy",
            OverallStatus::Starting => "starting",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Unknown => "unknown",
        }
    }

    /// Priority: error, unhealthy, starting, all healthy, else unknown.
    ///
    /// An empty set counts as all healthy.
    pub fn from_counts(counts: &BTreeMap<HealthState, usize>, total: usize) -> Self {
        let count = |state| counts.get(&state).copied().unwrap_or(0);
        if count(HealthState::Error) > 0 {
            OverallStatus::Degraded
        } else if count(HealthState::Unhealthy) > 0 {
            OverallStatus::Unhealthy
        } else if count(HealthState::Starting) > 0 {
            OverallStatus::Starting
        } else if count(HealthState::Healthy) == total {
            OverallStatus::Healthy
        } else {
            OverallStatus::Unknown
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One aggregate snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub total: usize,
    pub counts: BTreeMap<HealthState, usize>,
    pub containers: BTreeMap<String, HealthStatus>,
    pub overall: OverallStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthSummary {
    pub fn from_statuses(statuses: impl IntoIterator<Item = (String, HealthStatus)>) -> Self {
        let containers: BTreeMap<String, HealthStatus> = statuses.into_iter().collect();

        let mut counts = BTreeMap::new();
        for status in containers.values() {
            *counts.entry(status.status).or_insert(0) += 1;
        }

        let total = containers.len();
        Self {
            total,
            overall: OverallStatus::from_counts(&counts, total),
            counts,
            containers,
            timestamp: Utc::now(),
        }
    }

    pub fn count(&self, state: HealthState) -> usize {
        self.counts.get(&state).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_of(states: &[HealthState]) -> HealthSummary {
        HealthSummary::from_statuses(
            states
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("c{}", i), HealthStatus::new(*s, "test"))),
        )
    }

    #[test]
    fn test_priority_order() {
        use HealthState::*;
        assert_eq!(summary_of(&[Healthy, Unhealthy]).overall, OverallStatus::Unhealthy);
        assert_eq!(summary_of(&[Healthy, Starting]).overall, OverallStatus::Starting);
        assert_eq!(summary_of(&[Error]).overall, OverallStatus::Degraded);
        assert_eq!(summary_of(&[Healthy]).overall, OverallStatus::Healthy);
        assert_eq!(
            summary_of(&[Unhealthy, Error, Starting]).overall,
            OverallStatus::Degraded
        );
        assert_eq!(summary_of(&[Healthy, Unknown]).overall, OverallStatus::Unknown);
        assert_eq!(summary_of(&[NoHealthcheck]).overall, OverallStatus::Unknown);
    }

    #[test]
    fn test_empty_set_is_healthy() {
        let summary = summary_of(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.overall, OverallStatus::Healthy);
    }

    #[test]
    fn test_counts_per_status() {
        use HealthState::*;
        let summary = summary_of(&[Healthy, Healthy, Starting]);
        assert_eq!(summary.count(Healthy), 2);
        assert_eq!(summary.count(Starting), 1);
        assert_eq!(summary.count(Error), 0);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["overall"], "starting");
        assert_eq!(json["counts"]["healthy"], 2);
    }
}
