//! Cube Slicer HTTP Server
//!
//! # Endpoints
//!
//! ## Server
//! - `GET /health` - Health check
//! - `GET /version` - Server and API version
//! - `GET /info` - Workspace info
//! - `GET /cubes` - Cubes visible to the caller
//!
//! ## Cube
//! - `GET /cube/{cube}/model` - Cube model with browser features
//! - `GET /cube/{cube}/aggregate` - Aggregate a cell
//! - `GET /cube/{cube}/cell` - Cell with per-cut details
//! - `GET|POST /cube/{cube}/report` - Several named queries over one cell
//! - `GET /cube/{cube}/facts` - Fact listing
//! - `GET /cube/{cube}/fact/{id}` - Single fact
//! - `GET /cube/{cube}/members/{dimension}` - Dimension members
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration and model
//! - `list-cubes` - Print the cubes of the configured model
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config` argument
//! 2. `CUBES_CONFIG` environment variable (path to TOML file)
//! 3. `./slicer.toml` in current directory
//! 4. Default configuration

use clap::{Parser, Subcommand};
use cube_slicer::{
    api::{build_router, AppState},
    config::ApplicationConfig,
    engine::Identity,
    Workspace,
};
use std::{path::PathBuf, sync::Arc};
use tokio::signal;
use tracing::{debug, info, warn};

/// Graceful shutdown signal handler
///
/// Signal registration failures are logged and that signal is never awaited.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {},
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(name = "cube-slicer")]
#[command(version)]
#[command(about = "HTTP query layer for OLAP cubes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long, global = true)]
    listen: Option<String>,

    /// Path to the JSON model (overrides config)
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration and load the model
    CheckConfig,

    /// List cubes of the configured model
    ListCubes,
}

fn load_config(cli: &Cli) -> Result<ApplicationConfig, Box<dyn std::error::Error>> {
    let mut config = ApplicationConfig::discover(cli.config.as_deref())?;
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen.clone();
    }
    if let Some(model) = &cli.model {
        config.workspace.model_path = Some(model.clone());
    }
    config.validate()?;
    Ok(config)
}

fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli)?;
    let workspace = Workspace::from_config(&config)?;

    println!("Configuration is valid!");
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", config.server.listen_addr);
    println!("  Log level: {}", config.server.log_level);
    println!("  Identity header: {}", config.server.identity_header);
    println!();
    println!("Workspace:");
    println!("  Model: {:?}", config.workspace.model_path);
    println!("  Cubes: {}", workspace.cube_names().len());
    println!(
        "  Calendar: {} (first weekday {})",
        config.calendar.timezone, config.calendar.first_weekday
    );
    println!();
    println!("Authorization:");
    println!("  Enabled: {}", config.authorization.enabled);
    if config.authorization.enabled {
        println!("  Identities: {}", config.authorization.rights.len());
    }

    Ok(())
}

async fn cmd_list_cubes(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(cli)?;
    let workspace = Workspace::from_config(&config)?;

    for cube in workspace.list_cubes(&Identity::anonymous()).await? {
        println!("{}", serde_json::to_string(&cube.summary_json())?);
    }
    Ok(())
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => return cmd_check_config(&cli),
        Some(Commands::ListCubes) => return cmd_list_cubes(&cli).await,
        Some(Commands::Start) | None => {},
    }

    let config = load_config(&cli)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("Starting Cube Slicer v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        listen_addr = %config.server.listen_addr,
        model = ?config.workspace.model_path,
        authorization = config.authorization.enabled,
        "Configuration loaded"
    );

    let listen_addr = config.server.listen_addr.clone();
    let state = Arc::new(AppState::new(config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
