//! Declarative description of one dependency service.
//!
//! Definitions arrive already validated from the configuration layer; the
//! only structural rule enforced here is that each service resolves to
//! exactly one image source.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// Prefix for generated container names and image tags.
pub const NAME_PREFIX: &str = "brewctl";

/// One dependency service (database, broker, identity provider, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Service key in the dependency table. Filled in by the table loader.
    #[serde(default, skip_serializing)]
    pub name: String,
    /// Pre-built image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Build-from-context source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// `"host:container"` port strings.
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// `"source:target[:mode]"` or bare named-volume strings.
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheckSpec>,
    /// Command override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<ServiceCommand>,
}

/// Command override, written either as one line or as an argv list.
///
/// ```yaml
/// command: redis-server --requirepass "dev password"
/// command: ["redis-server", "--requirepass", "dev password"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceCommand {
    Line(String),
    Argv(Vec<String>),
}

impl ServiceCommand {
    /// Argv for the runtime API. A line is split like a POSIX shell would,
    /// honouring quotes and backslashes, without expansion. `None` for an
    /// unterminated quote or trailing backslash.
    pub fn argv(&self) -> Option<Vec<String>> {
        match self {
            ServiceCommand::Line(line) => split_command_line(line),
            ServiceCommand::Argv(argv) => Some(argv.clone()),
        }
    }
}

fn split_command_line(line: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '\'' => break,
                        c => current.push(c),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => match chars.next()? {
                            c @ ('"' | '\\' | '$' | '`') => current.push(c),
                            c => {
                                current.push('\\');
                                current.push(c);
                            }
                        },
                        c => current.push(c),
                    }
                }
            }
            '\\' => {
                in_word = true;
                current.push(chars.next()?);
            }
            c if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        args.push(current);
    }
    Some(args)
}

/// Build context for images built locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub context: PathBuf,
    #[serde(default = "default_dockerfile")]
    pub dockerfile: String,
}

fn default_dockerfile() -> String {
    "Dockerfile".to_string()
}

/// Health check declared by the service definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    /// Shell command run inside the container; exit 0 means healthy.
    pub command: String,
    /// Seconds between runtime-side checks.
    #[serde(default = "default_healthcheck_interval")]
    pub interval: u64,
    #[serde(default = "default_healthcheck_retries")]
    pub retries: u32,
    /// Seconds before a single check is considered failed.
    #[serde(default = "default_healthcheck_timeout")]
    pub timeout: u64,
}

fn default_healthcheck_interval() -> u64 {
    10
}

fn default_healthcheck_retries() -> u32 {
    5
}

fn default_healthcheck_timeout() -> u64 {
    5
}

/// Where a service's image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Pull the reference if it is not present locally.
    Pull(String),
    /// Build from a context directory and tag the result.
    Build {
        context: PathBuf,
        dockerfile: String,
        tag: String,
    },
}

impl ServiceDefinition {
    /// Container name, defaulting to `brewctl-{service}`.
    pub fn container_name(&self) -> String {
        self.container_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", NAME_PREFIX, self.name))
    }

    /// Resolve the single image source. Having neither or both is an error.
    pub fn image_source(&self) -> Result<ImageSource, RuntimeError> {
        match (&self.image, &self.build) {
            (Some(image), None) => Ok(ImageSource::Pull(image.clone())),
            (None, Some(build)) => Ok(ImageSource::Build {
                context: build.context.clone(),
                dockerfile: build.dockerfile.clone(),
                tag: format!("{}-{}:latest", NAME_PREFIX, self.container_name()),
            }),
            (None, None) => Err(RuntimeError::InvalidDefinition {
                name: self.name.clone(),
                reason: "either 'image' or 'build' must be specified".to_string(),
            }),
            (Some(_), Some(_)) => Err(RuntimeError::InvalidDefinition {
                name: self.name.clone(),
                reason: "'image' and 'build' are mutually exclusive".to_string(),
            }),
        }
    }

    /// Image reference used for identity heuristics before the image exists.
    pub fn image_hint(&self) -> String {
        match self.image_source() {
            Ok(ImageSource::Pull(image)) => image,
            Ok(ImageSource::Build { tag, .. }) => tag,
            Err(_) => String::new(),
        }
    }

    pub fn port_mappings(&self) -> Result<Vec<PortMapping>, RuntimeError> {
        self.ports
            .iter()
            .map(|p| {
                PortMapping::parse(p).ok_or_else(|| RuntimeError::InvalidDefinition {
                    name: self.name.clone(),
                    reason: format!("invalid port mapping '{}'", p),
                })
            })
            .collect()
    }

    /// Command override as argv, `Ok(None)` when the image default applies.
    pub fn command_argv(&self) -> Result<Option<Vec<String>>, RuntimeError> {
        let Some(command) = &self.command else {
            return Ok(None);
        };
        command
            .argv()
            .map(Some)
            .ok_or_else(|| RuntimeError::InvalidDefinition {
                name: self.name.clone(),
                reason: "unterminated quote in 'command'".to_string(),
            })
    }

    pub fn volume_mappings(&self) -> Vec<VolumeMapping> {
        self.volumes.iter().map(|v| VolumeMapping::parse(v)).collect()
    }
}

/// A published port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    pub host_port: String,
    /// Container port including protocol, e.g. `5432/tcp`.
    pub container_port: String,
}

impl PortMapping {
    /// Parse `"host:container"`, `"ip:host:container"` or a bare `"port"`.
    ///
    /// A bare port publishes the same number on the host.
    pub fn parse(spec: &str) -> Option<Self> {
        let parts: Vec<&str> = spec.trim().split(':').collect();
        let (host_ip, host_port, container) = match parts.as_slice() {
            [port] => (None, *port, *port),
            [host, container] => (None, *host, *container),
            [ip, host, container] => (Some(ip.to_string()), *host, *container),
            _ => return None,
        };

        let container_number = container.split('/').next().unwrap_or_default();
        if container_number.parse::<u16>().is_err() || host_port.parse::<u16>().is_err() {
            return None;
        }

        Some(Self {
            host_ip,
            host_port: host_port.to_string(),
            container_port: normalize_port_key(container),
        })
    }
}

/// `5432` becomes `5432/tcp`; keys that already carry a protocol are kept.
pub fn normalize_port_key(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{}/tcp", port)
    }
}

/// A volume or bind mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMapping {
    pub source: String,
    pub target: String,
    pub mode: String,
}

impl VolumeMapping {
    /// Split positionally: `source:target[:mode]`. A bare name is a named
    /// volume mounted at itself, read-write. Extra segments are ignored.
    pub fn parse(spec: &str) -> Self {
        let parts: Vec<&str> = spec.split(':').collect();
        match parts.as_slice() {
            [name] => Self {
                source: name.to_string(),
                target: name.to_string(),
                mode: "rw".to_string(),
            },
            [source, target] => Self {
                source: source.to_string(),
                target: target.to_string(),
                mode: "rw".to_string(),
            },
            [source, target, mode, ..] => Self {
                source: source.to_string(),
                target: target.to_string(),
                mode: mode.to_string(),
            },
            [] => unreachable!("split always yields at least one segment"),
        }
    }

    /// Named volumes are sources that are not host paths.
    pub fn is_named_volume(&self) -> bool {
        !(self.source.starts_with('/')
            || self.source.starts_with('.')
            || self.source.starts_with('~'))
    }

    /// Runtime bind string.
    pub fn to_bind(&self) -> String {
        format!("{}:{}:{}", self.source, self.target, self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_splitting() {
        let split = |line: &str| ServiceCommand::Line(line.to_string()).argv();
        assert_eq!(
            split("start-dev  --http-port=8080").unwrap(),
            vec!["start-dev", "--http-port=8080"]
        );
        assert_eq!(
            split(r#"sh -c 'echo "hi there"' "a \"b\"" c\ d ''"#).unwrap(),
            vec!["sh", "-c", r#"echo "hi there""#, r#"a "b""#, "c d", ""]
        );
        assert!(split("echo 'unterminated").is_none());
        assert!(split("trailing\\").is_none());
        assert_eq!(
            ServiceCommand::Argv(vec!["a b".to_string()]).argv().unwrap(),
            vec!["a b"]
        );
    }

    fn service(image: Option<&str>, build: Option<&str>) -> ServiceDefinition {
        ServiceDefinition {
            name: "database".to_string(),
            image: image.map(str::to_string),
            build: build.map(|c| BuildSpec {
                context: PathBuf::from(c),
                dockerfile: default_dockerfile(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_image_source_exclusive() {
        assert_eq!(
            service(Some("postgres:16"), None).image_source().unwrap(),
            ImageSource::Pull("postgres:16".to_string())
        );
        assert!(service(None, None).image_source().is_err());
        assert!(service(Some("postgres:16"), Some("./db")).image_source().is_err());
    }

    #[test]
    fn test_build_tag_uses_container_name() {
        let mut svc = service(None, Some("./core"));
        svc.container_name = Some("brewctl-core".to_string());
        match svc.image_source().unwrap() {
            ImageSource::Build { tag, dockerfile, .. } => {
                assert_eq!(tag, "brewctl-brewctl-core:latest");
                assert_eq!(dockerfile, "Dockerfile");
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn test_default_container_name() {
        assert_eq!(service(Some("redis"), None).container_name(), "brewctl-database");
    }

    #[test]
    fn test_port_parsing() {
        let p = PortMapping::parse("15432:5432").unwrap();
        assert_eq!(p.host_port, "15432");
        assert_eq!(p.container_port, "5432/tcp");

        let bare = PortMapping::parse("8080").unwrap();
        assert_eq!(bare.host_port, "8080");
        assert_eq!(bare.container_port, "8080/tcp");

        let with_ip = PortMapping::parse("127.0.0.1:5672:5672").unwrap();
        assert_eq!(with_ip.host_ip.as_deref(), Some("127.0.0.1"));

        assert!(PortMapping::parse("abc:5432").is_none());
    }

    #[test]
    fn test_volume_precedence() {
        let named = VolumeMapping::parse("pgdata");
        assert_eq!(named.source, "pgdata");
        assert_eq!(named.target, "pgdata");
        assert_eq!(named.mode, "rw");
        assert!(named.is_named_volume());

        let bind = VolumeMapping::parse("./init:/docker-entrypoint-initdb.d");
        assert_eq!(bind.target, "/docker-entrypoint-initdb.d");
        assert_eq!(bind.mode, "rw");
        assert!(!bind.is_named_volume());

        let ro = VolumeMapping::parse("/etc/certs:/certs:ro");
        assert_eq!(ro.mode, "ro");
        assert_eq!(ro.to_bind(), "/etc/certs:/certs:ro");
    }

    #[test]
    fn test_yaml_definition() {
        let yaml = r#"
image: postgres:16
container_name: brewctl-postgres
ports: ["15432:5432"]
environment:
  POSTGRES_USER: brewctl
healthcheck:
  command: pg_isready -U brewctl
"#;
        let svc: ServiceDefinition = serde_yml::from_str(yaml).unwrap();
        assert_eq!(svc.image.as_deref(), Some("postgres:16"));
        let hc = svc.healthcheck.unwrap();
        assert_eq!(hc.interval, 10);
        assert_eq!(hc.retries, 5);
    }
}
