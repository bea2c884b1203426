//! wattbot-server - meter reading ledger service
//!
//! Startup order: config, root folder, database, services, background
//! backfill, HTTP listener. The backfill runs on its own task and the
//! listener never waits for it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wattbot_common::config::{
    default_config_file, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use wattbot_server::services::{
    BackfillRunner, CommandDetector, Detector, DetectorConfig, FsArtifactStore,
};
use wattbot_server::AppState;

/// Command-line arguments for wattbot-server
#[derive(Parser, Debug)]
#[command(name = "wattbot-server")]
#[command(about = "Meter reading ledger service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and artifacts
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long, env = "WATTBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "WATTBOT_PORT")]
    port: Option<u16>,

    /// Skip the confidence backfill at startup
    #[arg(long)]
    no_backfill: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wattbot_server=info,wattbot_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting wattbot-server"
    );

    let config_path = args.config.clone().unwrap_or_else(default_config_file);
    let config = TomlConfig::load_or_default(&config_path);

    let root_folder = RootFolderResolver::new("wattbot-server")
        .with_cli_arg(args.root_folder.clone())
        .with_toml_config(&config)
        .resolve();

    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    let db = wattbot_common::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    let artifacts = Arc::new(FsArtifactStore::new(initializer.artifacts_path()));
    let detector: Arc<dyn Detector> = Arc::new(CommandDetector::new(&config.detector.command));
    let detector_config = DetectorConfig::from(&config.detector);
    info!(
        command = %config.detector.command,
        image_size = detector_config.image_size,
        confidence_floor = detector_config.confidence_floor,
        "Detector configured"
    );

    let backfill = if config.backfill.enabled && !args.no_backfill {
        let runner = BackfillRunner::new(
            db.clone(),
            artifacts.clone(),
            Arc::clone(&detector),
            detector_config.clone(),
        )
        .with_batch_size(config.backfill.batch_size);
        Some(runner.spawn())
    } else {
        info!("Backfill disabled");
        None
    };

    let state = AppState::new(db, artifacts, detector, detector_config);
    let app = wattbot_server::build_router(state);

    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = backfill {
        handle.cancel();
        match handle.join().await {
            Ok(checkpoints) => {
                for cp in checkpoints {
                    info!(
                        migration = %cp.name,
                        status = cp.status.as_str(),
                        processed = cp.processed_count,
                        "Backfill state at shutdown"
                    );
                }
            }
            Err(e) => warn!(error = %e, "Backfill ended with error"),
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
