//! Error types for brewctl.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the container runtime gateway.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime daemon cannot be reached. Fatal, never retried.
    #[error("Container runtime not available: {reason}")]
    Unavailable {
        /// Reason why the daemon is unreachable.
        reason: String,
    },

    /// The named container, network or image does not exist.
    #[error("'{name}' not found")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },

    /// A service definition cannot be turned into a container.
    #[error("Invalid service definition '{name}': {reason}")]
    InvalidDefinition {
        /// Service name.
        name: String,
        /// Reason for rejection.
        reason: String,
    },

    /// Failed to pull the image.
    #[error("Failed to pull image '{image}': {reason}")]
    ImagePull {
        /// Image reference.
        image: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to build the image from a context directory.
    #[error("Failed to build image '{tag}' from '{context}': {reason}")]
    ImageBuild {
        /// Tag being built.
        tag: String,
        /// Build context directory.
        context: PathBuf,
        /// Reason for failure.
        reason: String,
    },

    /// Network creation or removal failed.
    #[error("Network operation on '{name}' failed: {reason}")]
    NetworkFailed {
        /// Network name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to create the container.
    #[error("Failed to create container '{name}': {reason}")]
    ContainerCreate {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to start or resume the container.
    #[error("Failed to start container '{name}': {reason}")]
    ContainerStart {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to stop the container.
    #[error("Failed to stop container '{name}': {reason}")]
    ContainerStop {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to remove the container.
    #[error("Failed to remove container '{name}': {reason}")]
    ContainerRemove {
        /// Container name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Exec inside a container failed before producing an exit code.
    #[error("Exec in '{container}' failed: {reason}")]
    Exec {
        /// Container name.
        container: String,
        /// Reason for failure.
        reason: String,
    },

    /// Uploading an archive into a container failed.
    #[error("Upload into '{container}' at '{path}' failed: {reason}")]
    Upload {
        /// Container name.
        container: String,
        /// Target path inside the container.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Any other daemon API error.
    #[error("Runtime API error: {0}")]
    Api(String),

    /// I/O error on the host side.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    /// True when the daemon itself is unreachable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RuntimeError::Unavailable { .. })
    }
}

/// Configuration and dependency-table errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Profile '{0}' not found")]
    UnknownProfile(String),

    #[error("Service '{0}' not configured")]
    UnknownService(String),

    #[error("Invalid service '{name}': {reason}")]
    InvalidService { name: String, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from `wait_for_healthy`. Plain evaluation never errors.
#[derive(Debug, Error)]
pub enum HealthError {
    /// Evaluation returned an explicit unhealthy verdict.
    #[error("Container '{name}' reported unhealthy: {details}")]
    Unhealthy { name: String, details: String },

    /// The container did not become healthy in time.
    #[error("Container '{name}' did not become healthy within {waited:?}")]
    Timeout { name: String, waited: Duration },
}

/// Errors raised by the dependency orchestrator.
#[derive(Debug, Error)]
pub enum DependencyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A service in the batch failed to start; the rest of the batch was skipped.
    #[error("Failed to start service '{service}': {source}")]
    StartFailed {
        service: String,
        #[source]
        source: RuntimeError,
    },

    /// The compose tool exited unsuccessfully or could not be spawned.
    #[error("Compose failed: {reason}")]
    Compose { reason: String },

    #[error("Compose command '{command}' timed out after {timeout:?}")]
    ComposeTimeout { command: String, timeout: Duration },

    /// Compose failed and the direct fallback failed as well.
    #[error("Compose path failed ({compose}); direct fallback failed ({direct})")]
    BothPathsFailed {
        compose: Box<DependencyError>,
        direct: Box<DependencyError>,
    },
}

/// Errors from the live sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Plugin manifest error: {0}")]
    Manifest(#[from] ConfigError),

    #[error("Target container '{0}' is not running")]
    TargetNotRunning(String),

    #[error("File watch failed for {path}: {reason}")]
    Watch { path: PathBuf, reason: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_is_distinct() {
        let err = RuntimeError::Unavailable {
            reason: "socket missing".to_string(),
        };
        assert!(err.is_unavailable());
        assert!(
            !RuntimeError::NotFound {
                name: "db".to_string()
            }
            .is_unavailable()
        );
    }

    #[test]
    fn test_both_paths_message_names_each_cause() {
        let err = DependencyError::BothPathsFailed {
            compose: Box::new(DependencyError::Compose {
                reason: "exit 1".to_string(),
            }),
            direct: Box::new(DependencyError::Config(ConfigError::UnknownService(
                "cache".to_string(),
            ))),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit 1"));
        assert!(msg.contains("cache"));
    }
}
