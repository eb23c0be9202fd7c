//! homie-inspect - property inventory and move-out inspection service
//!
//! Owners photograph their rooms to build an inventory; tenants open a
//! single-use link, photograph the same rooms and get a discrepancy report
//! that is stored and emailed to the owner.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use homie_common::config::{load_default_toml_config, RootFolderInitializer, RootFolderResolver};
use homie_common::events::EventBus;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homie_inspect::config::resolve_service_config;
use homie_inspect::services::{
    DisabledMailer, DisabledVision, GeminiVisionClient, LocalPhotoStore, MailSender, MailjetClient,
    SessionRegistry, VisionAnalysisGateway,
};
use homie_inspect::{AppState, Collaborators, StateOptions};

/// Sessions untouched for this long are dropped
const SESSION_MAX_IDLE_HOURS: i64 = 24;
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(600);
const EVENT_BUS_CAPACITY: usize = 100;

/// Command-line arguments for homie-inspect
#[derive(Parser, Debug)]
#[command(name = "homie-inspect")]
#[command(about = "Property inventory and move-out inspection service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and stored photos
    #[arg(short, long, env = "HOMIE_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Address to listen on (e.g. 127.0.0.1:5780)
    #[arg(short, long, env = "HOMIE_BIND")]
    bind: Option<String>,

    /// Origin used in links handed to tenants
    #[arg(long, env = "HOMIE_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml_config = load_default_toml_config();

    let default_filter = toml_config
        .logging
        .level
        .clone()
        .map(|level| format!("homie_inspect={},homie_common={},tower_http={}", level, level, level))
        .unwrap_or_else(|| "homie_inspect=info,homie_common=info,tower_http=info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting homie-inspect v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new("homie-inspect")
        .with_cli_arg(args.root_folder)
        .with_toml(toml_config.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = homie_inspect::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let config = resolve_service_config(&db_pool, &toml_config, args.bind, args.public_base_url)
        .await
        .context("Failed to resolve configuration")?;

    let vision: Arc<dyn VisionAnalysisGateway> = match config.vision.clone() {
        Some(settings) => {
            info!(model = %settings.model, "Vision analysis enabled");
            Arc::new(GeminiVisionClient::new(settings).context("Failed to create vision client")?)
        }
        None => Arc::new(DisabledVision),
    };
    let mailer: Arc<dyn MailSender> = match config.mail.clone() {
        Some(settings) => {
            info!(sender = %settings.sender_email, "Report emails enabled");
            Arc::new(MailjetClient::new(settings).context("Failed to create mail client")?)
        }
        None => Arc::new(DisabledMailer),
    };
    let photos_dir = initializer.photos_path();
    let collaborators = Collaborators {
        vision,
        mailer,
        photos: Arc::new(LocalPhotoStore::new(photos_dir.clone())),
    };

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let state = AppState::new(
        db_pool,
        event_bus,
        collaborators,
        StateOptions {
            photos_dir,
            public_base_url: config.public_base_url.clone(),
            vision_timeout: config.vision_timeout,
        },
    );

    tokio::spawn(prune_sessions(state.inspections.sessions().clone()));

    let app = homie_inspect::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);
    info!("Public base URL: {}", config.public_base_url);
    info!("Owner dashboard: {}", config.dashboard_url());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Periodically drop abandoned inspection sessions
async fn prune_sessions(sessions: SessionRegistry) {
    let mut interval = tokio::time::interval(SESSION_PRUNE_INTERVAL);
    loop {
        interval.tick().await;
        let removed = sessions.prune(chrono::Duration::hours(SESSION_MAX_IDLE_HOURS)).await;
        if removed > 0 {
            info!(removed, "Pruned idle inspection sessions");
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
