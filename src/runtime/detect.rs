//! Docker and compose tool detection with platform-specific guidance.
//!
//! Run once per CLI invocation. The daemon check goes through
//! [`DockerRuntime::connect`](super::DockerRuntime::connect), so it honours
//! `DOCKER_HOST` and the rootless/Desktop socket fallbacks, and the
//! connected client is handed back for reuse. The compose probe result
//! feeds [`ExecutionPath::resolve`](crate::deps::ExecutionPath::resolve).

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::runtime::DockerRuntime;

/// How long a single `compose version` probe may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Docker daemon availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockerStatus {
    /// Binary found on PATH and daemon responding to ping.
    Available,
    /// `docker` binary not found on PATH.
    NotInstalled,
    /// Binary found but daemon not responding.
    NotRunning,
}

impl DockerStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, DockerStatus::Available)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DockerStatus::Available => "available",
            DockerStatus::NotInstalled => "not installed",
            DockerStatus::NotRunning => "not running",
        }
    }
}

/// Host platform for install guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Linux,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::MacOS,
            "windows" => Platform::Windows,
            _ => Platform::Linux,
        }
    }

    /// Installation instructions for Docker on this platform.
    pub fn install_hint(&self) -> &'static str {
        match self {
            Platform::MacOS => {
                "Install Docker Desktop: https://docs.docker.com/desktop/install/mac-install/"
            }
            Platform::Linux => "Install Docker Engine: https://docs.docker.com/engine/install/",
            Platform::Windows => {
                "Install Docker Desktop: https://docs.docker.com/desktop/install/windows-install/"
            }
        }
    }

    /// Instructions to start the Docker daemon on this platform.
    pub fn start_hint(&self) -> &'static str {
        match self {
            Platform::MacOS => "Start Docker Desktop from Applications, or run: open -a Docker",
            Platform::Linux => "Start the Docker daemon: sudo systemctl start docker",
            Platform::Windows => "Start Docker Desktop from the Start menu",
        }
    }
}

/// Result of a detection pass.
#[derive(Debug, Clone)]
pub struct DockerDetection {
    pub status: DockerStatus,
    pub platform: Platform,
    /// Argv prefix of a working compose tool, if any.
    pub compose_command: Option<Vec<String>>,
    /// Connected client when the daemon answered.
    pub runtime: Option<DockerRuntime>,
}

impl DockerDetection {
    /// One-line guidance for the user, `None` when everything is in place.
    pub fn hint(&self) -> Option<&'static str> {
        match self.status {
            DockerStatus::Available => None,
            DockerStatus::NotInstalled => Some(self.platform.install_hint()),
            DockerStatus::NotRunning => Some(self.platform.start_hint()),
        }
    }
}

/// Check whether Docker is installed and running, and which compose tool
/// is usable.
pub async fn check_docker() -> DockerDetection {
    let platform = Platform::current();

    if !docker_binary_exists().await {
        return DockerDetection {
            status: DockerStatus::NotInstalled,
            platform,
            compose_command: None,
            runtime: None,
        };
    }

    let runtime = match DockerRuntime::connect().await {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::debug!("Docker daemon not reachable: {}", e);
            return DockerDetection {
                status: DockerStatus::NotRunning,
                platform,
                compose_command: None,
                runtime: None,
            };
        }
    };

    DockerDetection {
        status: DockerStatus::Available,
        platform,
        compose_command: probe_compose_command().await,
        runtime: Some(runtime),
    }
}

/// Find a working compose tool.
///
/// Prefers the `docker compose` plugin and falls back to the standalone
/// `docker-compose` binary.
pub async fn probe_compose_command() -> Option<Vec<String>> {
    let candidates: [&[&str]; 2] = [&["docker", "compose"], &["docker-compose"]];

    for candidate in candidates {
        let version_arg = if candidate.len() > 1 {
            "version"
        } else {
            "--version"
        };
        if command_succeeds(candidate, version_arg).await {
            tracing::debug!("Using compose command: {}", candidate.join(" "));
            return Some(candidate.iter().map(|s| s.to_string()).collect());
        }
    }

    tracing::debug!("No compose tool found");
    None
}

async fn command_succeeds(argv: &[&str], last_arg: &str) -> bool {
    let Some((program, rest)) = argv.split_first() else {
        return false;
    };

    let mut cmd = Command::new(program);
    cmd.args(rest)
        .arg(last_arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(PROBE_TIMEOUT, cmd.status()).await {
        Ok(Ok(status)) => status.success(),
        _ => false,
    }
}

async fn docker_binary_exists() -> bool {
    #[cfg(unix)]
    let finder = "which";
    #[cfg(windows)]
    let finder = "where";

    command_succeeds(&[finder], "docker").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_hint_not_empty() {
        for platform in [Platform::MacOS, Platform::Linux, Platform::Windows] {
            assert!(!platform.install_hint().is_empty());
            assert!(!platform.start_hint().is_empty());
        }
    }

    #[test]
    fn test_docker_status_display() {
        assert_eq!(DockerStatus::Available.as_str(), "available");
        assert_eq!(DockerStatus::NotInstalled.as_str(), "not installed");
        assert_eq!(DockerStatus::NotRunning.as_str(), "not running");
        assert!(DockerStatus::Available.is_ok());
        assert!(!DockerStatus::NotRunning.is_ok());
    }

    #[test]
    fn test_hint_follows_status() {
        let detection = DockerDetection {
            status: DockerStatus::NotRunning,
            platform: Platform::Linux,
            compose_command: None,
            runtime: None,
        };
        assert_eq!(detection.hint(), Some(Platform::Linux.start_hint()));

        let ok = DockerDetection {
            status: DockerStatus::Available,
            ..detection
        };
        assert!(ok.hint().is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_usable() {
        assert!(!command_succeeds(&["brewctl-definitely-not-a-binary"], "--version").await);
        assert!(!command_succeeds(&[], "--version").await);
    }
}
