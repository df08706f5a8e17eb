use crate::config::DepsConfig;
use crate::deps::compose::ComposeDriver;

/// Which startup strategy the orchestrator uses. Resolved once.
#[derive(Debug, Clone)]
pub enum ExecutionPath {
    /// Generate a compose document and delegate to the compose tool, falling
    /// back to `Direct` when that fails.
    Compose(ComposeDriver),
    /// Drive the runtime gateway per service.
    Direct,
}

impl ExecutionPath {
    /// Pick the path for this host.
    ///
    /// An explicit `compose_command` is trusted as-is; otherwise the tool
    /// found by detection (see [`crate::runtime::check_docker`]) is used.
    pub fn resolve(config: &DepsConfig, detected: Option<Vec<String>>) -> Self {
        if !config.prefer_compose {
            tracing::debug!("Compose disabled by configuration, using direct path");
            return ExecutionPath::Direct;
        }

        let command = match &config.compose_command {
            Some(command) if !command.is_empty() => Some(command.clone()),
            _ => detected.filter(|command| !command.is_empty()),
        };

        match command {
            Some(command) => ExecutionPath::Compose(ComposeDriver::new(command, config)),
            None => {
                tracing::info!("No compose tool available, using direct path");
                ExecutionPath::Direct
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExecutionPath::Compose(_) => "compose",
            ExecutionPath::Direct => "direct",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docker_compose() -> Option<Vec<String>> {
        Some(vec!["docker".to_string(), "compose".to_string()])
    }

    #[test]
    fn test_disabled_compose_is_direct() {
        let config = DepsConfig {
            prefer_compose: false,
            compose_command: docker_compose(),
            ..DepsConfig::default()
        };
        let path = ExecutionPath::resolve(&config, docker_compose());
        assert!(matches!(path, ExecutionPath::Direct));
    }

    #[test]
    fn test_explicit_command_wins_over_detection() {
        let config = DepsConfig {
            compose_command: Some(vec!["my-compose".to_string()]),
            ..DepsConfig::default()
        };
        let path = ExecutionPath::resolve(&config, docker_compose());
        let ExecutionPath::Compose(driver) = path else {
            panic!("expected compose path");
        };
        assert_eq!(driver.command().to_vec(), vec!["my-compose".to_string()]);
    }

    #[test]
    fn test_detected_tool_is_used() {
        let path = ExecutionPath::resolve(&DepsConfig::default(), docker_compose());
        assert_eq!(path.name(), "compose");
    }

    #[test]
    fn test_no_tool_is_direct() {
        assert_eq!(ExecutionPath::resolve(&DepsConfig::default(), None).name(), "direct");
        assert_eq!(
            ExecutionPath::resolve(&DepsConfig::default(), Some(Vec::new())).name(),
            "direct"
        );
    }
}
