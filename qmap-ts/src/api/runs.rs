//! Run control API handlers
//!
//! POST /start, POST /stop, GET /status

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::runs;
use crate::error::{ApiError, ApiResult};
use crate::models::{RunSession, RunState, RunStatus};
use crate::services::standardizer::Standardizer;
use crate::AppState;

/// POST /start response
#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// POST /stop response
#[derive(Debug, Serialize)]
pub struct StopRunResponse {
    pub run_id: Uuid,
    /// State the run is transitioning to; the worker lands there once it
    /// observes the cancellation between questions
    pub state: RunState,
    pub processed_total: usize,
    pub stopped_at: chrono::DateTime<chrono::Utc>,
}

/// Build run control routes
pub fn run_routes() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_run))
        .route("/stop", post(stop_run))
        .route("/status", get(get_status))
}

/// POST /start
///
/// Begin a standardization run. One run at a time: 409 Conflict while a
/// worker holds a registered cancellation token. An active persisted row
/// with no registered token is reclaimed as stale before the new run
/// starts.
pub async fn start_run(State(state): State<AppState>) -> ApiResult<Json<StartRunResponse>> {
    let session = RunSession::new();
    let cancel = CancellationToken::new();

    {
        // write lock held across both checks so concurrent starts serialize
        let mut tokens = state.run_tokens.write().await;
        if !tokens.is_empty() {
            return Err(ApiError::Conflict(
                "Standardization run already in progress".to_string(),
            ));
        }
        if runs::has_running_run(&state.db).await? {
            // No token registered, so no worker is alive in this process;
            // the row was left active by a failed terminal save
            let reclaimed = runs::cleanup_stale_runs(&state.db).await?;
            tracing::warn!("Marked {} stale run(s) as cancelled", reclaimed);
        }
        tokens.insert(session.run_id, cancel.clone());
    }

    if let Err(e) = runs::save_run(&state.db, &session).await {
        state.run_tokens.write().await.remove(&session.run_id);
        return Err(e.into());
    }

    let response = StartRunResponse {
        run_id: session.run_id,
        state: session.state,
        started_at: session.started_at,
    };

    tracing::info!(run_id = %session.run_id, "Standardization run started");

    let worker_state = state.clone();
    let run_id = session.run_id;
    tokio::spawn(async move {
        let worker = Standardizer::with_pacing(
            worker_state.db.clone(),
            worker_state.event_bus.clone(),
            worker_state.classifier.clone(),
            worker_state.pacing.clone(),
        );

        let outcome = worker.run(session, cancel).await;

        worker_state.run_tokens.write().await.remove(&run_id);

        match outcome {
            Ok(finished) => {
                tracing::info!(
                    run_id = %run_id,
                    state = ?finished.state,
                    processed = finished.progress.processed_total,
                    "Standardization worker finished"
                );
            }
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "Standardization worker failed");
                *worker_state.last_error.write().await = Some(e.to_string());
            }
        }
    });

    Ok(Json(response))
}

/// POST /stop
///
/// Cancel the active run. Returns immediately; 404 when nothing is
/// running.
pub async fn stop_run(State(state): State<AppState>) -> ApiResult<Json<StopRunResponse>> {
    let entry = {
        let tokens = state.run_tokens.read().await;
        tokens.iter().next().map(|(id, token)| (*id, token.clone()))
    };

    let (run_id, token) =
        entry.ok_or_else(|| ApiError::NotFound("No run in progress".to_string()))?;

    token.cancel();
    tracing::info!(run_id = %run_id, "Stop requested");

    let snapshot = state.status.read().await.clone();

    Ok(Json(StopRunResponse {
        run_id,
        state: RunState::Cancelled,
        processed_total: snapshot.processed_total,
        stopped_at: chrono::Utc::now(),
    }))
}

/// GET /status
///
/// Current status snapshot as maintained by the event aggregator.
pub async fn get_status(State(state): State<AppState>) -> Json<RunStatus> {
    let mut snapshot = state.status.read().await.clone();
    snapshot.refresh_elapsed();
    Json(snapshot)
}
