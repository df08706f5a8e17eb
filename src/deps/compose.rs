//! Compose document generation and the compose tool subprocess.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;

use crate::config::DepsConfig;
use crate::error::DependencyError;
use crate::runtime::{BuildSpec, ServiceCommand, ServiceDefinition};

/// Generated compose document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeDocument {
    pub services: BTreeMap<String, ComposeService>,
    pub networks: BTreeMap<String, ComposeNetwork>,
    /// Named volumes; values are always empty mappings.
    pub volumes: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeNetwork {
    pub driver: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeService {
    pub container_name: String,
    pub networks: Vec<String>,
    pub restart: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<ComposeHealthcheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<ServiceCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposeHealthcheck {
    pub test: Vec<String>,
    pub interval: String,
    pub timeout: String,
    pub retries: u32,
}

impl ComposeDocument {
    /// One service block per definition, all on the shared network.
    ///
    /// Volume sources that are not host paths become named volumes.
    pub fn build(network: &str, driver: &str, services: &[&ServiceDefinition]) -> Self {
        let mut networks = BTreeMap::new();
        networks.insert(
            network.to_string(),
            ComposeNetwork {
                driver: driver.to_string(),
                name: network.to_string(),
            },
        );

        let mut volumes = BTreeMap::new();
        let mut blocks = BTreeMap::new();
        for service in services {
            for mapping in service.volume_mappings() {
                if mapping.is_named_volume() {
                    volumes.insert(mapping.source.clone(), BTreeMap::new());
                }
            }

            blocks.insert(
                service.name.clone(),
                ComposeService {
                    container_name: service.container_name(),
                    networks: vec![network.to_string()],
                    restart: "unless-stopped".to_string(),
                    image: service.image.clone(),
                    build: service.build.clone(),
                    environment: service.environment.clone(),
                    ports: service.ports.clone(),
                    volumes: service.volumes.clone(),
                    depends_on: service.depends_on.clone(),
                    healthcheck: service.healthcheck.as_ref().map(|hc| ComposeHealthcheck {
                        test: vec!["CMD-SHELL".to_string(), hc.command.clone()],
                        interval: format!("{}s", hc.interval),
                        timeout: format!("{}s", hc.timeout),
                        retries: hc.retries,
                    }),
                    command: service.command.clone(),
                },
            );
        }

        Self {
            services: blocks,
            networks,
            volumes,
        }
    }

    pub fn to_yaml(&self) -> Result<String, DependencyError> {
        serde_yml::to_string(self).map_err(|e| DependencyError::Compose {
            reason: format!("failed to serialize compose document: {}", e),
        })
    }
}

/// Drives the host's compose tool against a generated document on disk.
#[derive(Debug, Clone)]
pub struct ComposeDriver {
    command: Vec<String>,
    file: PathBuf,
    up_timeout: Duration,
    down_timeout: Duration,
}

impl ComposeDriver {
    /// `command` is the tool's argv prefix, e.g. `["docker", "compose"]`.
    pub fn new(command: Vec<String>, config: &DepsConfig) -> Self {
        Self {
            command,
            file: config.compose_file.clone(),
            up_timeout: config.compose_up_timeout,
            down_timeout: config.compose_down_timeout,
        }
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub async fn write(&self, document: &ComposeDocument) -> Result<(), DependencyError> {
        let yaml = document.to_yaml()?;
        tokio::fs::write(&self.file, yaml)
            .await
            .map_err(|e| DependencyError::Compose {
                reason: format!("failed to write {}: {}", self.file.display(), e),
            })?;
        tracing::debug!(file = %self.file.display(), "Wrote compose document");
        Ok(())
    }

    /// `up -d` against the written document.
    pub async fn up(&self) -> Result<(), DependencyError> {
        if !self.file.exists() {
            return Err(DependencyError::Compose {
                reason: format!("compose file not found: {}", self.file.display()),
            });
        }
        self.run(&["up", "-d"], self.up_timeout).await
    }

    /// `down`; a missing document means there is nothing to stop.
    pub async fn down(&self) -> Result<(), DependencyError> {
        if !self.file.exists() {
            tracing::debug!(file = %self.file.display(), "No compose file, nothing to stop");
            return Ok(());
        }
        self.run(&["down"], self.down_timeout).await
    }

    /// `down --volumes --remove-orphans`, then delete the document.
    pub async fn cleanup(&self) -> Result<(), DependencyError> {
        if !self.file.exists() {
            return Ok(());
        }
        let result = self
            .run(&["down", "--volumes", "--remove-orphans"], self.down_timeout)
            .await;

        if let Err(e) = tokio::fs::remove_file(&self.file).await {
            tracing::warn!(file = %self.file.display(), "Failed to remove compose file: {}", e);
        }
        result
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<(), DependencyError> {
        let Some((program, prefix)) = self.command.split_first() else {
            return Err(DependencyError::Compose {
                reason: "empty compose command".to_string(),
            });
        };

        let command_line = format!(
            "{} -f {} {}",
            self.command.join(" "),
            self.file.display(),
            args.join(" ")
        );
        tracing::info!("Running: {}", command_line);

        let mut cmd = Command::new(program);
        cmd.args(prefix)
            .arg("-f")
            .arg(&self.file)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| DependencyError::ComposeTimeout {
                command: command_line.clone(),
                timeout,
            })?
            .map_err(|e| DependencyError::Compose {
                reason: format!("failed to run '{}': {}", program, e),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(DependencyError::Compose {
            reason: format!(
                "'{}' exited with code {}: {}",
                command_line,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ),
        })
    }
}
