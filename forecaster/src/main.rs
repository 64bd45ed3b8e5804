//! Foresight forecaster service main entry point
//!
//! This service polls a metrics source for host utilization samples,
//! periodically retrains two short-horizon sequence models, and serves
//! multi-step CPU/RAM forecasts over an HTTP API.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use foresight_forecaster::config::ForecasterConfig;
use foresight_forecaster::error::{Result, SourceError};
use foresight_forecaster::service::ForecasterService;

/// Foresight forecaster command line interface
#[derive(Parser)]
#[command(name = "foresight-forecaster")]
#[command(about = "Foresight forecasting service for host CPU/RAM utilization")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Start the forecasting service
    Start,

    /// Validate configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },

    /// Query the health endpoint of a running service
    Health,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = initialize_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match &cli.command {
        Some(Commands::Start) | None => start_service(config).await,
        Some(Commands::Config { show }) => handle_config(config, *show),
        Some(Commands::Health) => health_check(config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

/// Initialize logging based on CLI flags
fn initialize_logging(cli: &Cli) -> Result<()> {
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(
            format!("foresight_forecaster={}", log_level)
                .parse()
                .map_err(|e| format!("invalid log directive: {e}"))?,
        )
        .add_directive("tokio=warn".parse().map_err(|e| format!("{e}"))?)
        .add_directive("hyper=warn".parse().map_err(|e| format!("{e}"))?);

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}

/// Load configuration from file, environment, or defaults
fn load_configuration(cli: &Cli) -> Result<ForecasterConfig> {
    let path = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Some(path.clone())
        }
        None => {
            let default_path = ForecasterConfig::default_config_path()?;
            if default_path.exists() {
                info!("Loading configuration from: {}", default_path.display());
                Some(default_path)
            } else {
                info!("Using default configuration");
                None
            }
        }
    };

    let config = ForecasterConfig::load_with_fallback(path)?;
    info!("Configuration loaded successfully");
    Ok(config)
}

/// Start the forecasting service and block until shutdown
async fn start_service(config: ForecasterConfig) -> Result<()> {
    let service = ForecasterService::new(config);
    service.run().await
}

/// Handle configuration commands
fn handle_config(config: ForecasterConfig, show: bool) -> Result<()> {
    if show {
        println!("Effective configuration:");
        println!(
            "{}",
            toml::to_string_pretty(&config).map_err(|e| e.to_string())?
        );
    } else {
        config.validate()?;
        println!("Configuration is valid");
    }

    Ok(())
}

/// Query a running service's health endpoint
async fn health_check(config: ForecasterConfig) -> Result<()> {
    let url = format!("http://127.0.0.1:{}/health", config.server.port);
    info!("Querying {url}");

    let body = reqwest::get(&url)
        .await
        .map_err(SourceError::from)?
        .text()
        .await
        .map_err(SourceError::from)?;

    println!("{body}");
    Ok(())
}
