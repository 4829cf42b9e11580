//! qmap-ts - Question Topic Standardization microservice
//!
//! **Module Identity:**
//! - Name: qmap-ts (Topic Standardization)
//! - Port: 5720
//!
//! Maps exam questions onto the master taxonomy with AI-assisted
//! classification, one subject table at a time, and streams progress to
//! the dashboard via SSE.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use qmap_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qmap_ts::models::run_status::spawn_status_aggregator;
use qmap_ts::services::classifier::TopicClassifier;
use qmap_ts::services::completion_client::CompletionClient;
use qmap_ts::taxonomy::TaxonomyIndex;
use qmap_ts::AppState;

/// Command-line arguments for qmap-ts
#[derive(Parser, Debug)]
#[command(name = "qmap-ts")]
#[command(about = "Question topic standardization microservice")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5720", env = "QMAP_TS_PORT")]
    port: u16,

    /// Data folder holding the database and taxonomy document
    #[arg(short, long, env = "QMAP_ROOT_FOLDER")]
    root_folder: Option<String>,

    /// Path to the master taxonomy JSON document
    #[arg(short, long, env = "QMAP_TAXONOMY_PATH")]
    taxonomy: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qmap_ts=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting qmap-ts (Topic Standardization) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Parse command-line arguments
    let args = Args::parse();

    let toml_config = qmap_common::config::load_toml_config()?;

    let data_folder = qmap_common::config::resolve_data_folder(
        args.root_folder.as_deref(),
        "QMAP_ROOT_FOLDER",
        Some("root_folder"),
    )?;
    std::fs::create_dir_all(&data_folder)
        .with_context(|| format!("Failed to create data folder {}", data_folder.display()))?;
    info!("Data folder: {}", data_folder.display());

    // Open or create database
    let db_path = data_folder.join("qmap.db");
    info!("Database: {}", db_path.display());
    let db_pool = qmap_ts::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Runs left RUNNING by an unclean shutdown would block /start forever
    let stale = qmap_ts::db::runs::cleanup_stale_runs(&db_pool).await?;
    if stale > 0 {
        warn!("Marked {} stale run(s) as cancelled", stale);
    }

    // Load the taxonomy document
    let taxonomy_path =
        qmap_ts::config::resolve_taxonomy_path(args.taxonomy.as_deref(), &toml_config, &data_folder);
    let taxonomy = TaxonomyIndex::load(&taxonomy_path)?;
    info!(
        "Taxonomy loaded from {}: {} cross-cutting categories, {} subjects",
        taxonomy_path.display(),
        taxonomy.category_count(),
        taxonomy.subject_count()
    );

    // Completion backend
    let api_key = qmap_ts::config::resolve_api_key(&toml_config)?;
    let settings = qmap_ts::config::resolve_completion_settings(&toml_config);
    let client = CompletionClient::with_endpoint(settings.base_url, settings.model, api_key)
        .context("Failed to build completion client")?;
    info!("Completion client ready (model: {})", client.model());

    let classifier = Arc::new(TopicClassifier::new(Arc::new(taxonomy), Arc::new(client)));

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(100); // 100 event capacity

    // Create application state and start the status aggregator
    let state = AppState::new(db_pool, event_bus, classifier);
    let _aggregator = spawn_status_aggregator(&state.event_bus, state.status.clone());

    // Build router
    let app = qmap_ts::build_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Dashboard: http://127.0.0.1:{}/", args.port);
    info!("Health check: http://127.0.0.1:{}/health", args.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
