//! Docker implementation of the runtime gateway.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
    UploadToContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{BuildImageOptions, CreateImageOptions};
use bollard::models::{ContainerInspectResponse, HealthConfig, HostConfig, PortBinding};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions};
use bytes::Bytes;
use futures::StreamExt;

use crate::error::RuntimeError;
use crate::runtime::archive;
use crate::runtime::service::{ImageSource, ServiceDefinition};
use crate::runtime::types::{ContainerRecord, ContainerStatus, DeclaredHealth, ExecOutput};
use crate::runtime::{ContainerRuntime, Result, TreeFilter};

/// Label applied to every container created by brewctl.
const SERVICE_LABEL: &str = "dev.brewctl.service";

/// Gateway backed by a local Docker daemon.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect to the local daemon and verify it responds.
    ///
    /// Tries the platform default first (honouring `DOCKER_HOST`), then the
    /// well-known user-level socket locations.
    pub async fn connect() -> Result<Self> {
        let mut last_error = String::from("no docker socket found");

        match Docker::connect_with_local_defaults() {
            Ok(docker) => match docker.ping().await {
                Ok(_) => return Ok(Self::new(docker)),
                Err(e) => last_error = e.to_string(),
            },
            Err(e) => last_error = e.to_string(),
        }

        #[cfg(unix)]
        for socket in candidate_sockets() {
            if !socket.exists() {
                continue;
            }
            let path = socket.to_string_lossy();
            if let Ok(docker) =
                Docker::connect_with_socket(&path, 120, bollard::API_DEFAULT_VERSION)
                && docker.ping().await.is_ok()
            {
                tracing::debug!(socket = %path, "Connected to Docker via fallback socket");
                return Ok(Self::new(docker));
            }
        }

        Err(RuntimeError::Unavailable { reason: last_error })
    }

    /// Inspect a container, `None` when the runtime does not know it.
    async fn inspect(&self, name: &str) -> Result<Option<ContainerRecord>> {
        match self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => Ok(Some(record_from_inspect(name, info))),
            Err(e) if status_code(&e) == Some(404) => Ok(None),
            Err(e) => Err(classify(e, RuntimeError::Api)),
        }
    }

    async fn pull_if_missing(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            tracing::debug!("Image '{}' exists locally", image);
            return Ok(());
        }

        tracing::info!("Pulling image: {}", image);

        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        tracing::trace!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(classify(e, |reason| RuntimeError::ImagePull {
                        image: image.to_string(),
                        reason,
                    }));
                }
            }
        }

        tracing::info!("Pulled image: {}", image);
        Ok(())
    }

    async fn build(&self, context: &Path, dockerfile: &str, tag: &str) -> Result<()> {
        tracing::info!(
            "Building image '{}' from '{}' ({})",
            tag,
            context.display(),
            dockerfile
        );

        let build_error = |reason: String| RuntimeError::ImageBuild {
            tag: tag.to_string(),
            context: context.to_path_buf(),
            reason,
        };

        let context_dir = context.to_path_buf();
        let tarball = tokio::task::spawn_blocking(move || archive::directory("", &context_dir, None))
            .await
            .map_err(|e| build_error(e.to_string()))?
            .map_err(|e| build_error(e.to_string()))?;

        let options = BuildImageOptions {
            dockerfile: dockerfile.to_string(),
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };

        let mut stream = self
            .docker
            .build_image(options, None, Some(Bytes::from(tarball)));

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(error) = info.error {
                        return Err(build_error(error));
                    }
                    if let Some(line) = info.stream {
                        let line = line.trim();
                        if !line.is_empty() {
                            tracing::trace!("Build: {}", line);
                        }
                    }
                }
                Err(e) => return Err(classify(e, build_error)),
            }
        }

        tracing::info!("Built image: {}", tag);
        Ok(())
    }

    async fn create(
        &self,
        service: &ServiceDefinition,
        image: &str,
        network: Option<&str>,
    ) -> Result<String> {
        let container_name = service.container_name();

        let ports = service.port_mappings()?;
        let mut port_bindings = HashMap::new();
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        for mapping in &ports {
            port_bindings.insert(
                mapping.container_port.clone(),
                Some(vec![PortBinding {
                    host_ip: mapping.host_ip.clone(),
                    host_port: Some(mapping.host_port.clone()),
                }]),
            );
            exposed_ports.insert(mapping.container_port.clone(), HashMap::new());
        }

        let env: Vec<String> = service
            .environment
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let binds: Vec<String> = service
            .volume_mappings()
            .iter()
            .map(|v| v.to_bind())
            .collect();

        let healthcheck = service.healthcheck.as_ref().map(|hc| HealthConfig {
            test: Some(vec!["CMD-SHELL".to_string(), hc.command.clone()]),
            interval: Some(secs_to_nanos(hc.interval)),
            timeout: Some(secs_to_nanos(hc.timeout)),
            retries: Some(i64::from(hc.retries)),
            ..Default::default()
        });

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            binds: if binds.is_empty() { None } else { Some(binds) },
            network_mode: network.map(str::to_string),
            ..Default::default()
        };

        let mut labels = HashMap::new();
        labels.insert(SERVICE_LABEL.to_string(), service.name.clone());

        let config = Config {
            image: Some(image.to_string()),
            env: if env.is_empty() { None } else { Some(env) },
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            healthcheck,
            labels: Some(labels),
            cmd: service.command_argv()?,
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: container_name.clone(),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| {
                classify(e, |reason| RuntimeError::ContainerCreate {
                    name: container_name.clone(),
                    reason,
                })
            })?;

        for warning in &response.warnings {
            tracing::warn!(container = %container_name, "{}", warning);
        }

        Ok(response.id)
    }

    async fn start_existing(&self, name: &str) -> Result<()> {
        match self
            .docker
            .start_container(name, None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if already_done(Op::Start, &e) => Ok(()),
            Err(e) => Err(classify(e, |reason| RuntimeError::ContainerStart {
                name: name.to_string(),
                reason,
            })),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RuntimeError::Unavailable {
                reason: e.to_string(),
            })
    }

    async fn ensure_network(&self, name: &str, driver: &str) -> Result<()> {
        let network_error = |reason: String| RuntimeError::NetworkFailed {
            name: name.to_string(),
            reason,
        };

        match self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(_) => {
                tracing::debug!("Network '{}' already exists", name);
                return Ok(());
            }
            Err(e) if status_code(&e) == Some(404) => {}
            Err(e) => return Err(classify(e, network_error)),
        }

        let options = CreateNetworkOptions {
            name: name.to_string(),
            driver: driver.to_string(),
            ..Default::default()
        };

        match self.docker.create_network(options).await {
            Ok(_) => {
                tracing::info!("Created network '{}' with driver '{}'", name, driver);
                Ok(())
            }
            // created concurrently
            Err(e) if already_done(Op::CreateNetwork, &e) => Ok(()),
            Err(e) => Err(classify(e, network_error)),
        }
    }

    async fn remove_network(&self, name: &str) -> Result<()> {
        match self.docker.remove_network(name).await {
            Ok(()) => {
                tracing::info!("Removed network '{}'", name);
                Ok(())
            }
            Err(e) if already_done(Op::RemoveNetwork, &e) => {
                tracing::debug!("Network '{}' not found (already removed)", name);
                Ok(())
            }
            Err(e) => Err(classify(e, |reason| RuntimeError::NetworkFailed {
                name: name.to_string(),
                reason,
            })),
        }
    }

    async fn start_service(
        &self,
        service: &ServiceDefinition,
        network: Option<&str>,
    ) -> Result<String> {
        let name = service.container_name();

        if let Some(existing) = self.inspect(&name).await? {
            match existing_action(existing.status) {
                ExistingAction::Reuse => {
                    tracing::debug!("Container '{}' is already running", name);
                    return Ok(existing.id);
                }
                ExistingAction::Unpause => {
                    self.docker.unpause_container(&name).await.map_err(|e| {
                        classify(e, |reason| RuntimeError::ContainerStart {
                            name: name.clone(),
                            reason,
                        })
                    })?;
                    tracing::info!("Resumed paused container '{}'", name);
                    return Ok(existing.id);
                }
                ExistingAction::Start => {
                    self.start_existing(&name).await?;
                    tracing::info!("Started existing container '{}'", name);
                    return Ok(existing.id);
                }
                ExistingAction::Recreate => {
                    tracing::warn!(
                        "Container '{}' is {}, recreating it",
                        name,
                        existing.status
                    );
                    self.remove(&name, true).await?;
                }
            }
        }

        let image = self.build_or_pull(service).await?;
        let id = self.create(service, &image, network).await?;
        self.start_existing(&id).await.map_err(|e| match e {
            RuntimeError::ContainerStart { reason, .. } => RuntimeError::ContainerStart {
                name: name.clone(),
                reason,
            },
            other => other,
        })?;

        tracing::info!("Started new container '{}' from image '{}'", name, image);
        Ok(id)
    }

    async fn stop(&self, name: &str, timeout: Duration) -> Result<()> {
        let options = StopContainerOptions {
            t: timeout.as_secs() as i64,
        };
        match self.docker.stop_container(name, Some(options)).await {
            Ok(()) => {
                tracing::info!("Stopped container '{}'", name);
                Ok(())
            }
            Err(e) if already_done(Op::Stop, &e) => {
                tracing::debug!("Container '{}' not running or not found", name);
                Ok(())
            }
            Err(e) => Err(classify(e, |reason| RuntimeError::ContainerStop {
                name: name.to_string(),
                reason,
            })),
        }
    }

    async fn remove(&self, name: &str, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => {
                tracing::info!("Removed container '{}'", name);
                Ok(())
            }
            Err(e) if already_done(Op::Remove, &e) => {
                tracing::debug!("Container '{}' not found", name);
                Ok(())
            }
            Err(e) => Err(classify(e, |reason| RuntimeError::ContainerRemove {
                name: name.to_string(),
                reason,
            })),
        }
    }

    async fn status(&self, name: &str) -> Result<ContainerRecord> {
        Ok(self
            .inspect(name)
            .await?
            .unwrap_or_else(|| ContainerRecord::not_found(name)))
    }

    async fn list(&self, all: bool) -> Result<Vec<ContainerRecord>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| classify(e, RuntimeError::Api))?;

        let mut records = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else { continue };
            // Skip containers removed between list and inspect.
            if let Some(record) = self.inspect(&id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            timestamps: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(name, Some(options));
        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(line) => output.push_str(&line.to_string()),
                Err(e) if status_code(&e) == Some(404) => {
                    return Err(RuntimeError::NotFound {
                        name: name.to_string(),
                    });
                }
                Err(e) => return Err(classify(e, RuntimeError::Api)),
            }
        }
        Ok(output)
    }

    async fn build_or_pull(&self, service: &ServiceDefinition) -> Result<String> {
        match service.image_source()? {
            ImageSource::Pull(image) => {
                self.pull_if_missing(&image).await?;
                Ok(image)
            }
            ImageSource::Build {
                context,
                dockerfile,
                tag,
            } => {
                self.build(&context, &dockerfile, &tag).await?;
                Ok(tag)
            }
        }
    }

    async fn push_bytes(
        &self,
        container: &str,
        container_path: &str,
        contents: &[u8],
    ) -> Result<()> {
        let tarball = archive::single_file(container_path, contents)?;
        self.upload(container, container_path, tarball).await
    }

    async fn push_tree(
        &self,
        container: &str,
        host_dir: &Path,
        container_dir: &str,
        filter: Option<TreeFilter>,
    ) -> Result<()> {
        let dir = host_dir.to_path_buf();
        let prefix = container_dir.to_string();
        let tarball = tokio::task::spawn_blocking(move || {
            archive::directory(&prefix, &dir, filter.as_deref())
        })
            .await
            .map_err(|e| RuntimeError::Upload {
                container: container.to_string(),
                path: container_dir.to_string(),
                reason: e.to_string(),
            })??;
        self.upload(container, container_dir, tarball).await
    }

    async fn exec(&self, container: &str, argv: &[String]) -> Result<ExecOutput> {
        let exec_error = |reason: String| RuntimeError::Exec {
            container: container.to_string(),
            reason,
        };

        let options = CreateExecOptions {
            cmd: Some(argv.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let created = match self.docker.create_exec(container, options).await {
            Ok(created) => created,
            Err(e) if status_code(&e) == Some(404) => {
                return Err(RuntimeError::NotFound {
                    name: container.to_string(),
                });
            }
            Err(e) => return Err(classify(e, exec_error)),
        };

        let mut output = String::new();
        match self
            .docker
            .start_exec(&created.id, None)
            .await
            .map_err(|e| classify(e, exec_error))?
        {
            StartExecResults::Attached {
                output: mut stream, ..
            } => {
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| classify(e, exec_error))?;
                    output.push_str(&chunk.to_string());
                }
            }
            StartExecResults::Detached => {}
        }

        let inspected = self
            .docker
            .inspect_exec(&created.id)
            .await
            .map_err(|e| classify(e, exec_error))?;

        Ok(ExecOutput {
            exit_code: inspected.exit_code.unwrap_or(-1),
            output,
        })
    }
}

impl DockerRuntime {
    /// Extract an archive at the container root; entries carry absolute paths.
    async fn upload(&self, container: &str, target: &str, tarball: Vec<u8>) -> Result<()> {
        let options = UploadToContainerOptions {
            path: "/".to_string(),
            ..Default::default()
        };
        match self
            .docker
            .upload_to_container(container, Some(options), Bytes::from(tarball))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if status_code(&e) == Some(404) => Err(RuntimeError::NotFound {
                name: container.to_string(),
            }),
            Err(e) => Err(classify(e, |reason| RuntimeError::Upload {
                container: container.to_string(),
                path: target.to_string(),
                reason,
            })),
        }
    }
}

/// HTTP status of a daemon response error.
/// What `start_service` does with a container that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExistingAction {
    /// Return its id untouched.
    Reuse,
    Unpause,
    /// Start it by name, keeping its id.
    Start,
    /// Force-remove, then create from the image.
    Recreate,
}

fn existing_action(status: ContainerStatus) -> ExistingAction {
    match status {
        ContainerStatus::Running | ContainerStatus::Restarting => ExistingAction::Reuse,
        ContainerStatus::Paused => ExistingAction::Unpause,
        ContainerStatus::Exited | ContainerStatus::Created => ExistingAction::Start,
        ContainerStatus::Dead | ContainerStatus::Error | ContainerStatus::NotFound => {
            ExistingAction::Recreate
        }
    }
}

/// Idempotent daemon operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Start,
    Stop,
    Remove,
    CreateNetwork,
    RemoveNetwork,
}

/// Daemon status codes meaning the operation's end state already holds.
fn tolerated_codes(op: Op) -> &'static [u16] {
    match op {
        // 304: already started
        Op::Start => &[304],
        // 404: no such container, 304: already stopped
        Op::Stop => &[404, 304],
        Op::Remove | Op::RemoveNetwork => &[404],
        // 409: name already in use
        Op::CreateNetwork => &[409],
    }
}

fn already_done(op: Op, err: &BollardError) -> bool {
    status_code(err).is_some_and(|code| tolerated_codes(op).contains(&code))
}

fn status_code(err: &BollardError) -> Option<u16> {
    match err {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

/// Daemon responses become the operation's error; anything else means the
/// daemon could not be talked to at all.
fn classify(err: BollardError, op_error: impl FnOnce(String) -> RuntimeError) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError { message, .. } => op_error(message),
        other => RuntimeError::Unavailable {
            reason: other.to_string(),
        },
    }
}

fn secs_to_nanos(secs: u64) -> i64 {
    Duration::from_secs(secs).as_nanos() as i64
}

fn record_from_inspect(requested: &str, info: ContainerInspectResponse) -> ContainerRecord {
    let name = info
        .name
        .as_deref()
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_else(|| requested.to_string());

    let state = info.state.as_ref();
    let status = state
        .and_then(|s| s.status.as_ref())
        .map(|s| ContainerStatus::from_runtime(&s.to_string()))
        .unwrap_or(ContainerStatus::Error);

    let image = info
        .config
        .as_ref()
        .and_then(|c| c.image.clone())
        .or_else(|| info.image.clone())
        .unwrap_or_default();

    let mut ports = BTreeMap::new();
    let mut networks = Vec::new();
    if let Some(settings) = info.network_settings.as_ref() {
        if let Some(port_map) = settings.ports.as_ref() {
            for (container_port, bindings) in port_map {
                let host_port = bindings
                    .as_ref()
                    .and_then(|b| b.first())
                    .and_then(|b| b.host_port.clone());
                if let Some(host_port) = host_port {
                    ports.insert(container_port.clone(), format!("localhost:{}", host_port));
                }
            }
        }
        if let Some(attached) = settings.networks.as_ref() {
            networks = attached.keys().cloned().collect();
            networks.sort();
        }
    }

    let has_declared_check = info
        .config
        .as_ref()
        .and_then(|c| c.healthcheck.as_ref())
        .and_then(|h| h.test.as_ref())
        .and_then(|t| t.first())
        .is_some_and(|first| first != "NONE");

    let mut record = ContainerRecord::new(info.id.clone().unwrap_or_default(), name, status, image)
        .with_ports(ports)
        .with_networks(networks);

    if has_declared_check {
        let health = state.and_then(|s| s.health.as_ref());
        record = record.with_declared_health(DeclaredHealth {
            status: health
                .and_then(|h| h.status.as_ref())
                .map(|s| s.to_string())
                .unwrap_or_else(|| "starting".to_string()),
            last_output: health
                .and_then(|h| h.log.as_ref())
                .and_then(|log| log.last())
                .and_then(|entry| entry.output.clone())
                .map(|out| out.trim().to_string()),
        });
    }

    record
}

#[cfg(unix)]
fn candidate_sockets() -> Vec<PathBuf> {
    let mut sockets = Vec::new();
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        sockets.push(PathBuf::from(runtime_dir).join("docker.sock"));
    }
    if let Ok(home) = std::env::var("HOME") {
        sockets.push(PathBuf::from(&home).join(".docker/run/docker.sock"));
        sockets.push(PathBuf::from(&home).join(".colima/default/docker.sock"));
    }
    sockets.push(PathBuf::from("/var/run/docker.sock"));
    sockets
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{
        ContainerConfig, ContainerState, ContainerStateStatusEnum, Health, HealthStatusEnum,
        HealthcheckResult, NetworkSettings,
    };

    fn server_error(code: u16) -> BollardError {
        BollardError::DockerResponseServerError {
            status_code: code,
            message: format!("daemon said {code}"),
        }
    }

    #[test]
    fn test_existing_container_actions() {
        assert_eq!(existing_action(ContainerStatus::Running), ExistingAction::Reuse);
        assert_eq!(existing_action(ContainerStatus::Restarting), ExistingAction::Reuse);
        assert_eq!(existing_action(ContainerStatus::Paused), ExistingAction::Unpause);
        assert_eq!(existing_action(ContainerStatus::Exited), ExistingAction::Start);
        assert_eq!(existing_action(ContainerStatus::Created), ExistingAction::Start);
        assert_eq!(existing_action(ContainerStatus::Dead), ExistingAction::Recreate);
        assert_eq!(existing_action(ContainerStatus::Error), ExistingAction::Recreate);
        assert_eq!(existing_action(ContainerStatus::NotFound), ExistingAction::Recreate);
    }

    #[test]
    fn test_absent_or_unchanged_targets_are_success() {
        assert!(already_done(Op::Stop, &server_error(404)));
        assert!(already_done(Op::Stop, &server_error(304)));
        assert!(already_done(Op::Start, &server_error(304)));
        assert!(already_done(Op::Remove, &server_error(404)));
        assert!(already_done(Op::RemoveNetwork, &server_error(404)));
        assert!(already_done(Op::CreateNetwork, &server_error(409)));

        assert!(!already_done(Op::Start, &server_error(404)));
        assert!(!already_done(Op::Remove, &server_error(409)));
        assert!(!already_done(Op::Stop, &server_error(500)));
        let socket = BollardError::SocketNotFoundError("/var/run/docker.sock".to_string());
        assert!(!already_done(Op::Stop, &socket));
    }

    fn inspect_response(status: ContainerStateStatusEnum) -> ContainerInspectResponse {
        let mut port_map = HashMap::new();
        port_map.insert(
            "5432/tcp".to_string(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some("15432".to_string()),
            }]),
        );
        port_map.insert("8080/tcp".to_string(), None);

        ContainerInspectResponse {
            id: Some("abc123".to_string()),
            name: Some("/brewctl-database".to_string()),
            state: Some(ContainerState {
                status: Some(status),
                ..Default::default()
            }),
            config: Some(ContainerConfig {
                image: Some("postgres:16".to_string()),
                ..Default::default()
            }),
            network_settings: Some(NetworkSettings {
                ports: Some(port_map),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_record_from_inspect() {
        let record = record_from_inspect(
            "brewctl-database",
            inspect_response(ContainerStateStatusEnum::RUNNING),
        );
        assert_eq!(record.name, "brewctl-database");
        assert_eq!(record.status, ContainerStatus::Running);
        assert_eq!(record.host_port("5432"), Some(15432));
        assert_eq!(record.host_port("8080"), None);
        assert!(record.declared_health.is_none());
    }

    #[test]
    fn test_declared_health_from_inspect() {
        let mut info = inspect_response(ContainerStateStatusEnum::RUNNING);
        info.config.as_mut().unwrap().healthcheck = Some(HealthConfig {
            test: Some(vec!["CMD-SHELL".to_string(), "pg_isready".to_string()]),
            ..Default::default()
        });
        info.state.as_mut().unwrap().health = Some(Health {
            status: Some(HealthStatusEnum::HEALTHY),
            log: Some(vec![HealthcheckResult {
                output: Some("accepting connections\n".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        });

        let record = record_from_inspect("brewctl-database", info);
        let declared = record.declared_health.unwrap();
        assert_eq!(declared.status, "healthy");
        assert_eq!(declared.last_output.as_deref(), Some("accepting connections"));
    }

    #[test]
    fn test_disabled_healthcheck_is_not_declared() {
        let mut info = inspect_response(ContainerStateStatusEnum::EXITED);
        info.config.as_mut().unwrap().healthcheck = Some(HealthConfig {
            test: Some(vec!["NONE".to_string()]),
            ..Default::default()
        });
        let record = record_from_inspect("x", info);
        assert!(record.declared_health.is_none());
        assert_eq!(record.status, ContainerStatus::Exited);
    }

    #[test]
    fn test_classify_separates_daemon_failures() {
        let server = BollardError::DockerResponseServerError {
            status_code: 500,
            message: "boom".to_string(),
        };
        assert!(matches!(
            classify(server, RuntimeError::Api),
            RuntimeError::Api(ref m) if m == "boom"
        ));

        let socket = BollardError::SocketNotFoundError("/var/run/docker.sock".to_string());
        assert!(classify(socket, RuntimeError::Api).is_unavailable());
    }
}
