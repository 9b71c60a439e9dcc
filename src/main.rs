//! wyze2mqtt - Main Entry Point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use wyze2mqtt::config::BridgeConfig;
use wyze2mqtt::observability::init_default_logging;
use wyze2mqtt::transport::mqtt::RumqttcConnector;
use wyze2mqtt::wyze::{DeviceApi, Session, WyzeClient, WyzeClientConfig};
use wyze2mqtt::{shutdown, Bridge, BridgeError};

/// MQTT bridge for Wyze smart bulbs
#[derive(Parser)]
#[command(name = "wyze2mqtt")]
#[command(about = "Control Wyze smart bulbs over MQTT")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "WYZE2MQTT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge until SIGINT/SIGTERM
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

    info!("Starting wyze2mqtt v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(config_path: &Option<PathBuf>) -> Result<BridgeConfig, BridgeError> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(BridgeConfig::load_from_file(path)?);
    }

    for path_str in ["wyze2mqtt.toml", "config/wyze2mqtt.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(BridgeConfig::load_from_file(&path)?);
        }
    }

    info!("No configuration file found, using defaults");
    Ok(BridgeConfig::default())
}

async fn run_bridge(config: BridgeConfig) -> Result<(), BridgeError> {
    let credentials = config.wyze_credentials()?;
    let mqtt_host = config.mqtt_host()?;
    let mqtt_credentials = config
        .get_mqtt_username()
        .map(|username| (username, config.get_mqtt_password().unwrap_or_default()));

    let connector = RumqttcConnector::new(config.mqtt.clone(), &mqtt_host, mqtt_credentials)?;

    let session = Session::default();
    let client = WyzeClient::new(WyzeClientConfig::from(&config.wyze), session.clone())?;
    let api: Arc<dyn DeviceApi> = Arc::new(client);

    let bridge = Bridge::start(&config, &credentials, api, session, connector).await?;

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let (shutdown_tx, shutdown_rx) = shutdown::channel();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
        shutdown_tx.send_replace(true);
    });

    info!("Bridge is running and waiting for commands on MQTT...");
    bridge.run(shutdown_rx).await;
    Ok(())
}

fn handle_config_command(config: &BridgeConfig, show: bool) -> Result<(), BridgeError> {
    if show {
        let rendered = toml::to_string_pretty(config)
            .map_err(|e| BridgeError::internal(format!("Failed to render configuration: {e}")))?;
        println!("Current configuration:");
        println!("{rendered}");
    }

    info!("Configuration validation complete");
    Ok(())
}
