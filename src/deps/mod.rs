//! Dependency Orchestrator.
//!
//! Resolves profiles to service lists and starts or stops them through one
//! of two execution paths:
//!
//! ```text
//!   start_profile(name)
//!        │ resolve every service first (unknown name = ConfigError)
//!        ▼
//!   ExecutionPath::Compose ──write document──► compose up -d
//!        │ failure                                  │ ok
//!        ▼                                          ▼
//!   direct: ensure_network ─► start_service (in order) ─► wait healthy ─► monitor
//!        │ failure after compose failure
//!        ▼
//!   DependencyError::BothPathsFailed
//! ```
//!
//! `stop_all`/`clean_all` stop health monitoring before any teardown.

mod compose;
mod connection;
mod path;
mod table;

pub use compose::{ComposeDocument, ComposeDriver, ComposeHealthcheck, ComposeNetwork, ComposeService};
pub use connection::connection_info;
pub use path::ExecutionPath;
pub use table::DependencyTable;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::OnceCell;

use crate::config::{Config, DepsConfig};
use crate::error::{DependencyError, RuntimeError};
use crate::health::{HealthAlert, HealthEvaluator, HealthMonitor, HealthReporter, HealthSummary};
use crate::runtime::{ContainerRecord, ContainerRuntime, ServiceDefinition};

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, DependencyError>;

/// Starts, stops and reports on the configured dependency services.
pub struct DependencyOrchestrator {
    table: DependencyTable,
    runtime: Arc<dyn ContainerRuntime>,
    evaluator: Arc<HealthEvaluator>,
    monitor: HealthMonitor,
    config: DepsConfig,
    path: ExecutionPath,
    alert_logger: OnceCell<()>,
}

impl DependencyOrchestrator {
    /// Build an orchestrator. `detected_compose` is the compose tool found
    /// on this host, if any.
    pub fn new(
        table: DependencyTable,
        runtime: Arc<dyn ContainerRuntime>,
        config: &Config,
        detected_compose: Option<Vec<String>>,
    ) -> Self {
        let path = ExecutionPath::resolve(&config.deps, detected_compose);
        tracing::debug!(path = path.name(), "Resolved execution path");
        Self::with_execution_path(table, runtime, config, path)
    }

    pub fn with_execution_path(
        table: DependencyTable,
        runtime: Arc<dyn ContainerRuntime>,
        config: &Config,
        path: ExecutionPath,
    ) -> Self {
        let evaluator = Arc::new(HealthEvaluator::new(Arc::clone(&runtime), &config.health));
        let monitor = HealthMonitor::new(Arc::clone(&evaluator), &config.health);
        Self {
            table,
            runtime,
            evaluator,
            monitor,
            config: config.deps.clone(),
            path,
            alert_logger: OnceCell::new(),
        }
    }

    pub fn execution_path(&self) -> &ExecutionPath {
        &self.path
    }

    pub fn table(&self) -> &DependencyTable {
        &self.table
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    /// Start every service of a profile in declared order.
    ///
    /// Returns the container names that were started or already running.
    pub async fn start_profile(&self, profile: &str) -> Result<Vec<String>> {
        let services = self.table.resolve_profile(profile)?;
        tracing::info!(
            profile = %profile,
            services = services.len(),
            path = self.path.name(),
            "Starting dependency profile"
        );
        self.start(&services).await
    }

    /// Start the named services in the given order.
    pub async fn start_services<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>> {
        let services = self.table.resolve_services(names)?;
        self.start(&services).await
    }

    async fn start(&self, services: &[&ServiceDefinition]) -> Result<Vec<String>> {
        let ExecutionPath::Compose(driver) = &self.path else {
            return self.start_direct(services).await;
        };

        match self.start_with_compose(driver, services).await {
            Ok(started) => Ok(started),
            Err(compose) => {
                tracing::warn!("Compose path failed, falling back to direct start: {}", compose);
                self.start_direct(services)
                    .await
                    .map_err(|direct| DependencyError::BothPathsFailed {
                        compose: Box::new(compose),
                        direct: Box::new(direct),
                    })
            }
        }
    }

    async fn start_with_compose(
        &self,
        driver: &ComposeDriver,
        services: &[&ServiceDefinition],
    ) -> Result<Vec<String>> {
        let document = ComposeDocument::build(
            &self.config.network_name,
            &self.config.network_driver,
            services,
        );
        driver.write(&document).await?;
        driver.up().await?;

        let mut started = Vec::with_capacity(services.len());
        for service in services {
            let container = service.container_name();
            self.after_start(&container).await;
            started.push(container);
        }
        Ok(started)
    }

    async fn start_direct(&self, services: &[&ServiceDefinition]) -> Result<Vec<String>> {
        self.runtime
            .ensure_network(&self.config.network_name, &self.config.network_driver)
            .await?;

        let mut started = Vec::with_capacity(services.len());
        for service in services {
            tracing::info!(service = %service.name, "Starting service");
            let id = self
                .runtime
                .start_service(service, Some(&self.config.network_name))
                .await
                .map_err(|source| start_error(&service.name, source))?;
            tracing::debug!(service = %service.name, id = %id, "Service container ready");

            let container = service.container_name();
            self.after_start(&container).await;
            started.push(container);
        }

        tracing::info!("Started {} dependency services", started.len());
        Ok(started)
    }

    /// Wait for the container to report healthy, then hand it to the monitor.
    /// A failed wait is reported but does not fail the start.
    async fn after_start(&self, container: &str) {
        match self.runtime.status(container).await {
            Ok(record) => {
                if let Err(e) = self
                    .evaluator
                    .wait_for_healthy(&record, self.config.startup_health_timeout)
                    .await
                {
                    tracing::warn!(container = %container, "{}", e);
                }
            }
            Err(e) => tracing::warn!(container = %container, "Could not inspect container: {}", e),
        }
        self.monitor.add_container(container).await;
    }

    /// Stop every configured service.
    pub async fn stop_all(&self) -> Result<()> {
        self.monitor.stop_monitoring().await;

        let compose = match &self.path {
            ExecutionPath::Compose(driver) => Some(driver.down().await),
            ExecutionPath::Direct => None,
        };
        let direct = self.stop_direct().await;
        merge_paths(compose, direct)
    }

    async fn stop_direct(&self) -> Result<()> {
        for container in self.table.container_names() {
            self.runtime
                .stop(&container, self.config.stop_timeout)
                .await?;
        }
        tracing::info!("All dependency services stopped");
        Ok(())
    }

    /// Stop and remove every configured container and the shared network.
    /// The compose path also removes generated volumes and the document.
    pub async fn clean_all(&self) -> Result<()> {
        self.monitor.stop_monitoring().await;

        let compose = match &self.path {
            ExecutionPath::Compose(driver) => Some(driver.cleanup().await),
            ExecutionPath::Direct => None,
        };
        let direct = self.clean_direct().await;
        merge_paths(compose, direct)
    }

    async fn clean_direct(&self) -> Result<()> {
        for container in self.table.container_names() {
            self.runtime.remove(&container, true).await?;
        }
        self.runtime
            .remove_network(&self.config.network_name)
            .await?;
        tracing::info!("Dependency cleanup completed");
        Ok(())
    }

    /// Fresh record per configured service, with health attached to running
    /// ones. Lookup failures become `error` records instead of failing the
    /// call.
    pub async fn status(&self) -> BTreeMap<String, ContainerRecord> {
        let records = self.snapshot().await;
        let evaluated = join_all(records.into_iter().map(|(name, record)| async move {
            if !record.is_running() {
                return (name, record);
            }
            let health = self.evaluator.evaluate(&record).await;
            (name, record.with_health(health))
        }))
        .await;
        evaluated.into_iter().collect()
    }

    /// Runtime state per service without health evaluation.
    async fn snapshot(&self) -> BTreeMap<String, ContainerRecord> {
        let mut records = BTreeMap::new();
        for (name, service) in &self.table.services {
            let container = service.container_name();
            let record = match self.runtime.status(&container).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!(container = %container, "Status lookup failed: {}", e);
                    ContainerRecord::error(container, e)
                }
            };
            records.insert(name.clone(), record);
        }
        records
    }

    /// Connection strings for running services with published ports.
    pub async fn connection_info(&self) -> BTreeMap<String, String> {
        connection_info(&self.table, &self.snapshot().await)
    }

    pub async fn logs(&self, service: &str, tail: usize) -> Result<String> {
        let service = self.table.service(service)?;
        Ok(self.runtime.logs(&service.container_name(), tail).await?)
    }

    /// Stop then start one service and wait for it to become healthy.
    pub async fn restart_service(&self, name: &str) -> Result<()> {
        let service = self.table.service(name)?;
        let container = service.container_name();

        self.runtime
            .stop(&container, self.config.stop_timeout)
            .await?;
        self.runtime
            .ensure_network(&self.config.network_name, &self.config.network_driver)
            .await?;
        self.runtime
            .start_service(service, Some(&self.config.network_name))
            .await
            .map_err(|source| start_error(name, source))?;
        self.after_start(&container).await;

        tracing::info!(service = %name, "Restarted service");
        Ok(())
    }

    /// Register every running configured container and start the monitor.
    ///
    /// Returns the number of containers watched; the loop is not started
    /// when nothing is running.
    pub async fn start_health_monitoring(&self) -> usize {
        self.alert_logger
            .get_or_init(|| async {
                self.monitor
                    .subscribe(Arc::new(|alert: &HealthAlert| -> anyhow::Result<()> {
                        tracing::warn!("{}", HealthReporter.failure_alert(alert));
                        Ok(())
                    }))
                    .await;
            })
            .await;

        let running: Vec<String> = self
            .status()
            .await
            .into_values()
            .filter(|r| r.is_running())
            .map(|r| r.name)
            .collect();

        if running.is_empty() {
            tracing::info!("No running containers found to monitor");
            return 0;
        }

        for name in &running {
            self.monitor.add_container(name.clone()).await;
        }
        self.monitor.start_monitoring().await;
        running.len()
    }

    pub async fn stop_health_monitoring(&self) {
        self.monitor.stop_monitoring().await;
    }

    /// Evaluate every running configured container now.
    pub async fn health_summary(&self) -> HealthSummary {
        let running: Vec<String> = self
            .status()
            .await
            .into_values()
            .filter(|r| r.is_running())
            .map(|r| r.name)
            .collect();
        self.evaluator.summarize(&running).await
    }

    /// Text report of current health plus monitoring state.
    pub async fn health_report(&self) -> String {
        let summary = self.health_summary().await;
        let mut report = HealthReporter.status_report(&summary);

        let monitoring = if self.monitor.is_running().await {
            "active"
        } else {
            "inactive"
        };
        report.push_str(&format!("\n\nMonitoring: {}", monitoring));

        let failing: Vec<String> = self
            .monitor
            .failure_counts()
            .await
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(name, count)| format!("{} ({})", name, count))
            .collect();
        if !failing.is_empty() {
            report.push_str(&format!("\nConsecutive failures: {}", failing.join(", ")));
        }
        report
    }

    pub async fn health_history(&self, limit: usize) -> Vec<HealthSummary> {
        self.monitor.history(Some(limit)).await
    }
}

fn start_error(service: &str, source: RuntimeError) -> DependencyError {
    if source.is_unavailable() {
        DependencyError::Runtime(source)
    } else {
        DependencyError::StartFailed {
            service: service.to_string(),
            source,
        }
    }
}

/// The direct sweep always runs; only its failure fails the operation, and
/// it is reported together with the compose failure when both failed.
fn merge_paths(compose: Option<Result<()>>, direct: Result<()>) -> Result<()> {
    match (compose, direct) {
        (Some(Err(compose)), Err(direct)) => Err(DependencyError::BothPathsFailed {
            compose: Box::new(compose),
            direct: Box::new(direct),
        }),
        (_, Err(direct)) => Err(direct),
        (Some(Err(compose)), Ok(())) => {
            tracing::warn!("Compose teardown failed, direct teardown succeeded: {}", compose);
            Ok(())
        }
        _ => Ok(()),
    }
}
