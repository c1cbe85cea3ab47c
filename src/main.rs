//! fwagent - Main Entry Point
//!
//! Wires the MQTT session, sensor, and executable identity into the agent
//! supervisor and runs it until a completed update or a shutdown signal.

use clap::{Parser, Subcommand};
use fwagent::agent::{AgentState, AgentSupervisor, ExecutableIdentity};
use fwagent::config::AgentConfig;
use fwagent::observability::init_default_logging;
use fwagent::sensor::SimulatedSensor;
use fwagent::transport::mqtt::MqttSession;
use std::path::PathBuf;
use std::process;
use tokio::signal;
use tracing::{error, info};

/// Self-updating MQTT telemetry agent for managed field devices
#[derive(Parser)]
#[command(name = "fwagent")]
#[command(about = "Self-updating MQTT telemetry agent for managed field devices")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent
    Run,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting fwagent v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_agent(config).await,
        Commands::Config { show } => handle_config_command(config, show).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

async fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<AgentConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(AgentConfig::load_from_file(path)?)
        }
        None => {
            // Try default locations
            let default_paths = vec![
                "fwagent.toml",
                "config/fwagent.toml",
                "/etc/fwagent/fwagent.toml",
            ];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(AgentConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create fwagent.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_agent(config: AgentConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Application starting as agent: {}", config.agent.name);

    let mut supervisor = build_supervisor(config).await?;

    // Graceful shutdown on either termination signal
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    let run_result = tokio::select! {
        result = supervisor.run() => result,
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
            Ok(())
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
            Ok(())
        }
    };

    // Disconnect always runs; a completed update launches its successor here
    supervisor.shutdown().await?;
    run_result?;
    Ok(())
}

/// Transport factory for creating transport instances
struct TransportFactory;

impl TransportFactory {
    async fn create_mqtt_transport(
        agent_name: &str,
        mqtt_config: fwagent::config::MqttSection,
    ) -> Result<MqttSession, Box<dyn std::error::Error>> {
        Ok(MqttSession::new(agent_name, mqtt_config).await?)
    }
}

/// Bootstrap factory - creates the supervisor with injected dependencies
/// This is where all the coupling/factory logic lives, separated from business logic
async fn build_supervisor(
    config: AgentConfig,
) -> Result<AgentSupervisor<MqttSession>, Box<dyn std::error::Error>> {
    let transport =
        TransportFactory::create_mqtt_transport(&config.agent.name, config.mqtt.clone()).await?;

    let identity = ExecutableIdentity::from_current_process()?;
    info!(executable = %identity.path().display(), "Resolved running executable");

    Ok(AgentSupervisor::new(
        config,
        transport,
        Box::new(SimulatedSensor::new()),
        AgentState::new(identity),
    ))
}

async fn handle_config_command(
    config: AgentConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
