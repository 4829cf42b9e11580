//! qmap-ts library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod subjects;
pub mod taxonomy;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use qmap_common::events::EventBus;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::RunStatus;
use crate::services::classifier::TopicClassifier;
use crate::services::standardizer::PacingPolicy;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Shared classifier (taxonomy index + completion backend)
    pub classifier: Arc<TopicClassifier>,
    /// Status snapshot maintained by the event aggregator
    pub status: Arc<RwLock<RunStatus>>,
    /// Cancellation tokens for active runs
    pub run_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Pacing applied between classifier calls
    pub pacing: PacingPolicy,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last worker error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, classifier: Arc<TopicClassifier>) -> Self {
        Self {
            db,
            event_bus,
            classifier,
            status: Arc::new(RwLock::new(RunStatus::default())),
            run_tokens: Arc::new(RwLock::new(HashMap::new())),
            pacing: PacingPolicy::default(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::cors::CorsLayer;

    Router::new()
        // UI routes (HTML pages)
        .merge(api::ui_routes())
        // API routes
        .merge(api::run_routes())
        .route("/events", get(api::event_stream))
        .merge(api::health_routes())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
        .with_state(state)
}
