//! Per-container health evaluation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::config::HealthConfig;
use crate::error::HealthError;
use crate::health::status::{HealthState, HealthStatus};
use crate::health::strategy::{HealthStrategy, ProbeKind};
use crate::health::summary::HealthSummary;
use crate::runtime::{ContainerRecord, ContainerRuntime, ContainerStatus};

/// Timeout for the HTTP readiness probe.
const HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the strategy attached to a container record.
///
/// Evaluation never fails: exec errors, missing port mappings and
/// timeouts all come back as a `HealthStatus` with `status=error`.
pub struct HealthEvaluator {
    runtime: Arc<dyn ContainerRuntime>,
    http: reqwest::Client,
    evaluation_timeout: Duration,
    poll_interval: Duration,
}

impl HealthEvaluator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: &HealthConfig) -> Self {
        Self {
            runtime,
            http: reqwest::Client::new(),
            evaluation_timeout: config.evaluation_timeout,
            poll_interval: config.poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Evaluate one container descriptor.
    pub async fn evaluate(&self, record: &ContainerRecord) -> HealthStatus {
        if record.status == ContainerStatus::Error
            && let Some(error) = &record.error
        {
            return HealthStatus::error("runtime_lookup", error.clone());
        }

        match tokio::time::timeout(self.evaluation_timeout, self.run_strategy(record)).await {
            Ok(status) => status,
            Err(_) => HealthStatus::error(
                strategy_method(record.strategy),
                format!(
                    "health check timed out after {}s",
                    self.evaluation_timeout.as_secs()
                ),
            ),
        }
    }

    /// Fetch a fresh record for `name` and evaluate it.
    pub async fn check(&self, name: &str) -> HealthStatus {
        let record = self.refresh(name).await;
        self.evaluate(&record).await
    }

    /// Evaluate every named container and aggregate the verdicts.
    pub async fn summarize(&self, names: &[String]) -> HealthSummary {
        let statuses = join_all(names.iter().map(|name| async move {
            (name.clone(), self.check(name).await)
        }))
        .await;
        HealthSummary::from_statuses(statuses)
    }

    /// Poll until the container is healthy, reports unhealthy, or `max_wait`
    /// elapses. `starting`, `unknown` and `error` keep polling.
    pub async fn wait_for_healthy(
        &self,
        record: &ContainerRecord,
        max_wait: Duration,
    ) -> Result<HealthStatus, HealthError> {
        let started = tokio::time::Instant::now();
        let mut current = record.clone();

        loop {
            let status = self.evaluate(&current).await;
            match status.status {
                HealthState::Healthy => {
                    tracing::debug!(container = %record.name, method = %status.method, "Container is healthy");
                    return Ok(status);
                }
                HealthState::Unhealthy => {
                    return Err(HealthError::Unhealthy {
                        name: record.name.clone(),
                        details: status.summary_text().unwrap_or("no details").to_string(),
                    });
                }
                other => {
                    tracing::trace!(container = %record.name, status = %other, "Waiting for container");
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= max_wait {
                return Err(HealthError::Timeout {
                    name: record.name.clone(),
                    waited: max_wait,
                });
            }
            tokio::time::sleep(self.poll_interval.min(max_wait - elapsed)).await;
            current = self.refresh(&record.name).await;
        }
    }

    async fn refresh(&self, name: &str) -> ContainerRecord {
        match self.runtime.status(name).await {
            Ok(record) => record,
            Err(e) => ContainerRecord::error(name, e),
        }
    }

    async fn run_strategy(&self, record: &ContainerRecord) -> HealthStatus {
        match record.strategy {
            HealthStrategy::Declared => check_declared(record),
            HealthStrategy::ReadinessProbe(ProbeKind::Keycloak) => self.check_http(record).await,
            HealthStrategy::ReadinessProbe(kind) => self.check_probe(record, kind).await,
            HealthStrategy::GenericExec => self.check_generic(record).await,
        }
    }

    async fn check_probe(&self, record: &ContainerRecord, kind: ProbeKind) -> HealthStatus {
        let Some(argv) = kind.exec_command() else {
            return HealthStatus::error(kind.method(), "probe has no exec command");
        };

        match self.runtime.exec(&record.name, &argv).await {
            Ok(out) => {
                let passed = match kind {
                    ProbeKind::Mongo => out.success() && out.output.contains('1'),
                    _ => out.success(),
                };
                if passed {
                    HealthStatus::healthy(kind.method(), kind.ready_message())
                } else {
                    HealthStatus::unhealthy(kind.method(), out.output.trim())
                }
            }
            Err(e) => HealthStatus::error(kind.method(), e.to_string()),
        }
    }

    async fn check_http(&self, record: &ContainerRecord) -> HealthStatus {
        let method = ProbeKind::Keycloak.method();
        let Some(port) = record.host_port("9000") else {
            return HealthStatus::new(HealthState::Unknown, method)
                .with_details("No port mapping found");
        };

        let url = format!("http://127.0.0.1:{}/health", port);
        match self
            .http
            .get(&url)
            .timeout(HTTP_PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                HealthStatus::healthy(method, ProbeKind::Keycloak.ready_message())
            }
            Ok(response) => HealthStatus::unhealthy(
                method,
                format!("Health endpoint returned {}", response.status().as_u16()),
            ),
            Err(e) => HealthStatus::error(method, e.to_string()),
        }
    }

    async fn check_generic(&self, record: &ContainerRecord) -> HealthStatus {
        if !record.is_running() {
            return HealthStatus::unhealthy(
                "generic_status",
                format!("Container status: {}", record.status),
            );
        }

        let argv = vec!["echo".to_string(), "health_check".to_string()];
        match self.runtime.exec(&record.name, &argv).await {
            Ok(out) if out.success() => {
                HealthStatus::healthy("generic_exec", "Container is running and responsive")
            }
            Ok(_) => HealthStatus::unhealthy("generic_exec", "Container not responding to commands"),
            Err(e) => HealthStatus::error("generic_exec", e.to_string()),
        }
    }
}

fn check_declared(record: &ContainerRecord) -> HealthStatus {
    match &record.declared_health {
        Some(declared) => {
            let mut status =
                HealthStatus::new(HealthState::from_runtime(&declared.status), "builtin");
            status.details = declared.last_output.clone();
            status
        }
        None => HealthStatus::error("builtin", "runtime reported no health state"),
    }
}

fn strategy_method(strategy: HealthStrategy) -> &'static str {
    match strategy {
        HealthStrategy::Declared => "builtin",
        HealthStrategy::ReadinessProbe(kind) => kind.method(),
        HealthStrategy::GenericExec => "generic_exec",
    }
}
