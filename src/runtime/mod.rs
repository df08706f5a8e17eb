//! Container Runtime Gateway.
//!
//! Thin, idempotent operations over a container runtime. Every mutating
//! call is safe to retry:
//!
//! - `ensure_network` succeeds when the network already exists.
//! - `start_service` returns the id of an already-running container,
//!   resumes a stopped or paused one by name, and only otherwise resolves
//!   the image and creates a new container.
//! - `stop`/`remove`/`remove_network` treat an absent target as success.
//!
//! Daemon connectivity failures surface as [`RuntimeError::Unavailable`]
//! and are never retried here.
//!
//! ```text
//!   DependencyOrchestrator ─┐
//!   HealthEvaluator ────────┼──► dyn ContainerRuntime ──► DockerRuntime ──► daemon
//!   LiveSyncEngine ─────────┘                        └──► StubRuntime (tests)
//! ```

mod archive;
pub mod detect;
mod docker;
pub mod service;
pub mod types;

pub use detect::{DockerDetection, DockerStatus, Platform, check_docker, probe_compose_command};
pub use docker::DockerRuntime;
pub use service::{
    BuildSpec, HealthCheckSpec, ImageSource, PortMapping, ServiceCommand, ServiceDefinition,
    VolumeMapping,
};
pub use types::{ContainerRecord, ContainerStatus, DeclaredHealth, ExecOutput};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::RuntimeError;

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Operations the core needs from a container runtime.
/// Path predicate for [`ContainerRuntime::push_tree`]. Receives paths
/// relative to the tree root; `false` skips the entry and, for a
/// directory, everything beneath it.
pub type TreeFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check that the daemon answers.
    async fn ping(&self) -> Result<()>;

    /// Create the network unless it already exists.
    async fn ensure_network(&self, name: &str, driver: &str) -> Result<()>;

    /// Remove the network; absent is success.
    async fn remove_network(&self, name: &str) -> Result<()>;

    /// Start a service idempotently and return its container id.
    ///
    /// When `network` is given, newly created containers join it.
    async fn start_service(
        &self,
        service: &ServiceDefinition,
        network: Option<&str>,
    ) -> Result<String>;

    /// Stop a container; absent or already stopped is success.
    async fn stop(&self, name: &str, timeout: Duration) -> Result<()>;

    /// Remove a container; absent is success.
    async fn remove(&self, name: &str, force: bool) -> Result<()>;

    /// Describe a container. Unknown names yield a `not_found` record.
    async fn status(&self, name: &str) -> Result<ContainerRecord>;

    /// List containers, including stopped ones when `all` is set.
    async fn list(&self, all: bool) -> Result<Vec<ContainerRecord>>;

    /// Last `tail` lines of the container's combined log.
    async fn logs(&self, name: &str, tail: usize) -> Result<String>;

    /// Pull or build the service image and return the reference to run.
    async fn build_or_pull(&self, service: &ServiceDefinition) -> Result<String>;

    /// Write `contents` to an absolute path inside the container,
    /// creating parent directories.
    async fn push_bytes(&self, container: &str, container_path: &str, contents: &[u8])
    -> Result<()>;

    /// Copy a host directory recursively to `container_dir`, skipping
    /// entries the filter rejects.
    async fn push_tree(
        &self,
        container: &str,
        host_dir: &Path,
        container_dir: &str,
        filter: Option<TreeFilter>,
    ) -> Result<()>;

    /// Run `argv` inside the container and collect its exit code and output.
    async fn exec(&self, container: &str, argv: &[String]) -> Result<ExecOutput>;

    /// Copy a single host file into the container.
    async fn push_file(&self, container: &str, host_path: &Path, container_path: &str) -> Result<()> {
        let contents = tokio::fs::read(host_path).await?;
        self.push_bytes(container, container_path, &contents).await
    }
}
