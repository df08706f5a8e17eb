//! Test doubles for code that talks to a container runtime.
//!
//! Provides [`StubRuntime`], an in-memory [`ContainerRuntime`] that:
//! - keeps container records by name and honours the idempotency contract
//!   of `start_service`/`stop`/`remove`,
//! - counts creates via [`creates()`](StubRuntime::creates),
//! - records every push and exec,
//! - returns scripted exec results per program.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use brewctl::runtime::ContainerRuntime;
//! use brewctl::testing::StubRuntime;
//!
//! let stub = Arc::new(StubRuntime::new());
//! let runtime: Arc<dyn ContainerRuntime> = stub.clone();
//! // hand `runtime` to the code under test, assert on `stub`
//! assert_eq!(stub.creates(), 0);
//! # drop(runtime);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RuntimeError;
use crate::runtime::{
    ContainerRecord, ContainerRuntime, ContainerStatus, DeclaredHealth, ExecOutput, ImageSource,
    Result, ServiceDefinition, TreeFilter,
};

/// A file written into a container through `push_bytes`/`push_tree`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedFile {
    pub container: String,
    pub path: String,
    pub contents: Vec<u8>,
}

#[derive(Default)]
struct StubState {
    containers: BTreeMap<String, ContainerRecord>,
    networks: BTreeSet<String>,
    pushes: Vec<PushedFile>,
    execs: Vec<(String, Vec<String>)>,
    exec_scripts: HashMap<String, VecDeque<ExecOutput>>,
    failing_services: HashSet<String>,
    logs: HashMap<String, String>,
}

/// In-memory container runtime.
pub struct StubRuntime {
    state: Mutex<StubState>,
    create_count: AtomicU32,
    unavailable: AtomicBool,
}

impl StubRuntime {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StubState::default()),
            create_count: AtomicU32::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        // A panicking test must not cascade into the others sharing the stub.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(RuntimeError::Unavailable {
                reason: "stub daemon offline".to_string(),
            });
        }
        Ok(())
    }

    /// Seed or replace a container record.
    pub fn insert(&self, record: ContainerRecord) {
        self.state().containers.insert(record.name.clone(), record);
    }

    /// Number of containers created through `start_service`.
    pub fn creates(&self) -> u32 {
        self.create_count.load(Ordering::Relaxed)
    }

    /// Toggle whether every call fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Make `start_service` fail for a service name.
    pub fn fail_start(&self, service: impl Into<String>) {
        self.state().failing_services.insert(service.into());
    }

    pub fn set_status(&self, name: &str, status: ContainerStatus) {
        if let Some(record) = self.state().containers.get_mut(name) {
            record.status = status;
        }
    }

    /// Replace the published port map of a container.
    pub fn set_ports(&self, name: &str, ports: BTreeMap<String, String>) {
        if let Some(record) = self.state().containers.get_mut(name) {
            record.ports = ports;
        }
    }

    pub fn set_logs(&self, name: &str, logs: impl Into<String>) {
        self.state().logs.insert(name.to_string(), logs.into());
    }

    /// Queue an exec result for `program`. The last queued result repeats.
    pub fn script_exec(&self, program: &str, output: ExecOutput) {
        self.state()
            .exec_scripts
            .entry(program.to_string())
            .or_default()
            .push_back(output);
    }

    /// Drop scripted results; `program` then succeeds with empty output.
    pub fn clear_exec_script(&self, program: &str) {
        self.state().exec_scripts.remove(program);
    }

    pub fn container(&self, name: &str) -> Option<ContainerRecord> {
        self.state().containers.get(name).cloned()
    }

    pub fn networks(&self) -> Vec<String> {
        self.state().networks.iter().cloned().collect()
    }

    pub fn pushes(&self) -> Vec<PushedFile> {
        self.state().pushes.clone()
    }

    /// `(container, argv)` for every exec, in call order.
    pub fn execs(&self) -> Vec<(String, Vec<String>)> {
        self.state().execs.clone()
    }
}

impl Default for StubRuntime {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_tree(
    root: &Path,
    dir: &Path,
    filter: Option<&TreeFilter>,
    out: &mut Vec<(String, Vec<u8>)>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        if filter.is_some_and(|keep| !keep(rel)) {
            continue;
        }
        if path.is_dir() {
            collect_tree(root, &path, filter, out)?;
        } else {
            let rel = rel.to_string_lossy().replace('\\', "/");
            out.push((rel, std::fs::read(&path)?));
        }
    }
    Ok(())
}

#[async_trait]
impl ContainerRuntime for StubRuntime {
    async fn ping(&self) -> Result<()> {
        self.check_available()
    }

    async fn ensure_network(&self, name: &str, _driver: &str) -> Result<()> {
        self.check_available()?;
        self.state().networks.insert(name.to_string());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        self.check_available()?;
        self.state().networks.remove(name);
        Ok(())
    }

    async fn start_service(
        &self,
        service: &ServiceDefinition,
        network: Option<&str>,
    ) -> Result<String> {
        self.check_available()?;
        let name = service.container_name();
        let mut state = self.state();

        if state.failing_services.contains(&service.name) {
            return Err(RuntimeError::ContainerStart {
                name,
                reason: "scripted failure".to_string(),
            });
        }

        if let Some(existing) = state.containers.get_mut(&name) {
            match existing.status {
                ContainerStatus::Running | ContainerStatus::Restarting => {
                    return Ok(existing.id.clone());
                }
                ContainerStatus::Paused | ContainerStatus::Exited | ContainerStatus::Created => {
                    existing.status = ContainerStatus::Running;
                    return Ok(existing.id.clone());
                }
                ContainerStatus::Dead | ContainerStatus::Error | ContainerStatus::NotFound => {
                    state.containers.remove(&name);
                }
            }
        }

        let image = match service.image_source()? {
            ImageSource::Pull(image) => image,
            ImageSource::Build { tag, .. } => tag,
        };

        let mut ports = BTreeMap::new();
        for mapping in service.port_mappings()? {
            ports.insert(
                mapping.container_port,
                format!("localhost:{}", mapping.host_port),
            );
        }

        let n = self.create_count.fetch_add(1, Ordering::Relaxed) + 1;
        let id = format!("stub-{}", n);
        let mut record = ContainerRecord::new(id.clone(), name.clone(), ContainerStatus::Running, image)
            .with_ports(ports)
            .with_networks(network.map(|n| vec![n.to_string()]).unwrap_or_default());
        if service.healthcheck.is_some() {
            record = record.with_declared_health(DeclaredHealth {
                status: "healthy".to_string(),
                last_output: None,
            });
        }
        state.containers.insert(name, record);
        Ok(id)
    }

    async fn stop(&self, name: &str, _timeout: Duration) -> Result<()> {
        self.check_available()?;
        if let Some(record) = self.state().containers.get_mut(name) {
            record.status = ContainerStatus::Exited;
        }
        Ok(())
    }

    async fn remove(&self, name: &str, force: bool) -> Result<()> {
        self.check_available()?;
        let mut state = self.state();
        if let Some(record) = state.containers.get(name)
            && record.is_running()
            && !force
        {
            return Err(RuntimeError::ContainerRemove {
                name: name.to_string(),
                reason: "container is running".to_string(),
            });
        }
        state.containers.remove(name);
        Ok(())
    }

    async fn status(&self, name: &str) -> Result<ContainerRecord> {
        self.check_available()?;
        Ok(self
            .container(name)
            .unwrap_or_else(|| ContainerRecord::not_found(name)))
    }

    async fn list(&self, all: bool) -> Result<Vec<ContainerRecord>> {
        self.check_available()?;
        Ok(self
            .state()
            .containers
            .values()
            .filter(|r| all || r.is_running())
            .cloned()
            .collect())
    }

    async fn logs(&self, name: &str, _tail: usize) -> Result<String> {
        self.check_available()?;
        let state = self.state();
        if !state.containers.contains_key(name) {
            return Err(RuntimeError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(state.logs.get(name).cloned().unwrap_or_default())
    }

    async fn build_or_pull(&self, service: &ServiceDefinition) -> Result<String> {
        self.check_available()?;
        Ok(match service.image_source()? {
            ImageSource::Pull(image) => image,
            ImageSource::Build { tag, .. } => tag,
        })
    }

    async fn push_bytes(&self, container: &str, container_path: &str, contents: &[u8]) -> Result<()> {
        self.check_available()?;
        let mut state = self.state();
        if !state.containers.contains_key(container) {
            return Err(RuntimeError::NotFound {
                name: container.to_string(),
            });
        }
        state.pushes.push(PushedFile {
            container: container.to_string(),
            path: container_path.to_string(),
            contents: contents.to_vec(),
        });
        Ok(())
    }

    async fn push_tree(
        &self,
        container: &str,
        host_dir: &Path,
        container_dir: &str,
        filter: Option<TreeFilter>,
    ) -> Result<()> {
        let mut files = Vec::new();
        collect_tree(host_dir, host_dir, filter.as_ref(), &mut files)?;
        let base = container_dir.trim_end_matches('/');
        for (rel, contents) in files {
            self.push_bytes(container, &format!("{}/{}", base, rel), &contents)
                .await?;
        }
        Ok(())
    }

    async fn exec(&self, container: &str, argv: &[String]) -> Result<ExecOutput> {
        self.check_available()?;
        let mut state = self.state();
        state.execs.push((container.to_string(), argv.to_vec()));

        match state.containers.get(container) {
            None => {
                return Err(RuntimeError::NotFound {
                    name: container.to_string(),
                });
            }
            Some(record) if !record.is_running() => {
                return Err(RuntimeError::Exec {
                    container: container.to_string(),
                    reason: format!("container is {}", record.status),
                });
            }
            Some(_) => {}
        }

        let program = argv.first().cloned().unwrap_or_default();
        let scripted = state.exec_scripts.get_mut(&program).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });

        Ok(scripted.unwrap_or(ExecOutput {
            exit_code: 0,
            output: String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, image: &str) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            image: Some(image.to_string()),
            ports: vec!["15432:5432".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let stub = StubRuntime::new();
        let db = service("database", "postgres:16");
        let first = stub.start_service(&db, Some("net")).await.unwrap();
        let second = stub.start_service(&db, Some("net")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(stub.creates(), 1);

        let record = stub.status("brewctl-database").await.unwrap();
        assert_eq!(record.host_port("5432"), Some(15432));
        assert_eq!(record.networks, vec!["net"]);
    }

    #[tokio::test]
    async fn test_stopped_container_is_resumed_not_recreated() {
        let stub = StubRuntime::new();
        let db = service("database", "postgres:16");
        let id = stub.start_service(&db, None).await.unwrap();
        stub.stop("brewctl-database", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(stub.start_service(&db, None).await.unwrap(), id);
        assert_eq!(stub.creates(), 1);
    }

    #[tokio::test]
    async fn test_exec_script_last_result_repeats() {
        let stub = StubRuntime::new();
        stub.insert(ContainerRecord::new("1", "c", ContainerStatus::Running, "x"));
        stub.script_exec(
            "probe",
            ExecOutput {
                exit_code: 1,
                output: String::new(),
            },
        );
        stub.script_exec(
            "probe",
            ExecOutput {
                exit_code: 0,
                output: String::new(),
            },
        );
        let argv = vec!["probe".to_string()];
        assert_eq!(stub.exec("c", &argv).await.unwrap().exit_code, 1);
        assert_eq!(stub.exec("c", &argv).await.unwrap().exit_code, 0);
        assert_eq!(stub.exec("c", &argv).await.unwrap().exit_code, 0);
    }
}
