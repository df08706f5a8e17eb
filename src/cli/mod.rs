//! CLI command handling.
//!
//! Provides subcommands for:
//! - Starting dependencies (`up <profile>`, `start <service>...`)
//! - Stopping and removing them (`down`, `clean`)
//! - Inspecting them (`status`, `env`, `health`, `logs`)
//! - Live-syncing a plugin into the core container (`sync`)

mod status;

pub use status::{render_env, render_status};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ColorChoice, Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::deps::{DependencyOrchestrator, DependencyTable};
use crate::runtime::{ContainerRuntime, check_docker};
use crate::sync::{LiveSyncEngine, PluginManifest};

#[derive(Parser, Debug)]
#[command(name = "brewctl")]
#[command(about = "Run, monitor and live-sync a local development environment")]
#[command(
    long_about = "brewctl starts dependency containers from a YAML table, watches their health and mirrors plugin sources into a running core container.\nExamples:\n  brewctl up plugin-dev  # Start the plugin-dev profile\n  brewctl env  # Print connection strings"
)]
#[command(version)]
#[command(color = ColorChoice::Auto)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Dependency table (services and profiles)
    #[arg(long, global = true, env = "BREWCTL_DEPS", default_value = "brewctl.yml")]
    pub deps: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start every service of a profile
    #[command(
        about = "Start a dependency profile",
        long_about = "Starts the profile's services in declared order and waits for each to report healthy.\nExample: brewctl up plugin-dev"
    )]
    Up {
        profile: String,

        /// Keep running and monitor health until Ctrl-C
        #[arg(long)]
        watch: bool,
    },

    /// Start individual services
    Start {
        #[arg(required = true)]
        services: Vec<String>,
    },

    /// Stop every configured service
    Down,

    /// Stop and remove every configured container, volume and the network
    Clean,

    /// Show container status per service
    Status {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Print connection strings for running services
    Env,

    /// Print a health report
    Health {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },

    /// Show a service's recent log output
    Logs {
        service: String,

        /// Number of lines from the end
        #[arg(long, default_value = "100")]
        tail: usize,
    },

    /// Restart one service
    Restart { service: String },

    /// Mirror a plugin into the core container and keep it in sync
    #[command(
        about = "Live-sync a plugin",
        long_about = "Copies the plugin's sources into the container, then watches for edits until Ctrl-C.\nExample: brewctl sync ./my-plugin --container brewctl-core"
    )]
    Sync {
        #[arg(default_value = ".")]
        plugin_dir: PathBuf,

        /// Target container (defaults to BREWCTL_CORE_CONTAINER)
        #[arg(long)]
        container: Option<String>,

        /// Delete the plugin's directory from the container on exit
        #[arg(long)]
        remove_on_exit: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Execute one parsed command against the local Docker daemon.
pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let detection = check_docker().await;
    if let Some(hint) = detection.hint() {
        anyhow::bail!("Docker is {}. {}", detection.status.as_str(), hint);
    }
    let Some(docker) = detection.runtime else {
        anyhow::bail!("Docker is {}", detection.status.as_str());
    };
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(docker);

    if let Command::Sync {
        plugin_dir,
        container,
        remove_on_exit,
    } = &cli.command
    {
        return run_sync(
            runtime,
            &config,
            plugin_dir,
            container.as_deref(),
            *remove_on_exit,
        )
        .await;
    }

    let table = DependencyTable::load(&cli.deps)
        .with_context(|| format!("loading dependency table {}", cli.deps.display()))?;
    let orchestrator =
        DependencyOrchestrator::new(table, runtime, &config, detection.compose_command);

    match cli.command {
        Command::Up { profile, watch } => {
            let started = orchestrator.start_profile(&profile).await?;
            println!("Started {} services: {}", started.len(), started.join(", "));
            if watch {
                let watched = orchestrator.start_health_monitoring().await;
                println!("Monitoring {} containers, press Ctrl-C to stop", watched);
                tokio::signal::ctrl_c().await?;
                orchestrator.stop_health_monitoring().await;
            }
        }
        Command::Start { services } => {
            let started = orchestrator.start_services(&services).await?;
            println!("Started {} services: {}", started.len(), started.join(", "));
        }
        Command::Down => {
            orchestrator.stop_all().await?;
            println!("All services stopped");
        }
        Command::Clean => {
            orchestrator.clean_all().await?;
            println!("Containers, volumes and network removed");
        }
        Command::Status { output } => {
            let records = orchestrator.status().await;
            match output {
                OutputFormat::Text => println!("{}", render_status(&records)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
            }
        }
        Command::Env => {
            print!("{}", render_env(&orchestrator.connection_info().await));
        }
        Command::Health { output } => match output {
            OutputFormat::Text => println!("{}", orchestrator.health_report().await),
            OutputFormat::Json => {
                let summary = orchestrator.health_summary().await;
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        },
        Command::Logs { service, tail } => {
            print!("{}", orchestrator.logs(&service, tail).await?);
        }
        Command::Restart { service } => {
            orchestrator.restart_service(&service).await?;
            println!("Restarted {}", service);
        }
        Command::Sync { .. } => {}
    }
    Ok(())
}

async fn run_sync(
    runtime: Arc<dyn ContainerRuntime>,
    config: &Config,
    plugin_dir: &std::path::Path,
    container: Option<&str>,
    remove_on_exit: bool,
) -> anyhow::Result<()> {
    let manifest = PluginManifest::load(plugin_dir)?;
    let engine = LiveSyncEngine::new(runtime, &config.sync)?;

    let pushed = engine.mirror(&manifest, plugin_dir, container).await?;
    println!("Mirrored {} directories of '{}'", pushed, manifest.name);

    engine
        .start_with_manifest(&manifest, plugin_dir, container)
        .await?;
    println!("Watching {} for changes, press Ctrl-C to stop", plugin_dir.display());

    tokio::signal::ctrl_c().await?;
    engine.stop_all().await;
    if remove_on_exit {
        engine.unmirror(&manifest.name, container).await?;
        println!("Removed '{}' from the container", manifest.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_up_with_defaults() {
        let cli = Cli::try_parse_from(["brewctl", "up", "plugin-dev"]).unwrap();
        assert_eq!(cli.deps, PathBuf::from("brewctl.yml"));
        assert!(!cli.json);
        assert!(matches!(
            cli.command,
            Command::Up { ref profile, watch: false } if profile == "plugin-dev"
        ));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["brewctl", "logs", "database", "--tail", "5", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Logs { tail: 5, .. }));
    }

    #[test]
    fn test_start_requires_a_service() {
        assert!(Cli::try_parse_from(["brewctl", "start"]).is_err());
    }

    #[test]
    fn test_sync_defaults_to_current_dir() {
        let cli = Cli::try_parse_from(["brewctl", "sync"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Sync { ref plugin_dir, container: None, remove_on_exit: false }
                if plugin_dir == &PathBuf::from(".")
        ));

        let cli =
            Cli::try_parse_from(["brewctl", "sync", "./tracker", "--remove-on-exit"]).unwrap();
        assert!(matches!(cli.command, Command::Sync { remove_on_exit: true, .. }));
    }

    #[test]
    fn test_status_output_format() {
        let cli = Cli::try_parse_from(["brewctl", "status", "--output", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Status {
                output: OutputFormat::Json
            }
        ));
        let cli = Cli::try_parse_from(["brewctl", "health"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Health {
                output: OutputFormat::Text
            }
        ));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
