//! Server-Sent Events (SSE) for run progress streaming

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// GET /events - SSE stream of run progress
///
/// Two kinds of frames:
/// - named run events forwarded straight off the bus (RunStarted,
///   SubjectStarted, QuestionClassified, SubjectCompleted, RunCompleted,
///   RunCancelled, RunFailed, LogLine)
/// - a `StatusTick` frame every second carrying the full status
///   snapshot, so late-joining clients converge without event replay
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected");

    // Subscribe to event broadcast
    let mut rx = state.event_bus.subscribe();
    let status = state.status.clone();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                // Full snapshot once per second
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    let mut snapshot = status.read().await.clone();
                    snapshot.refresh_elapsed();
                    match serde_json::to_string(&snapshot) {
                        Ok(json) => {
                            yield Ok(Event::default().event("StatusTick").data(json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize status snapshot: {}", e);
                        }
                    }
                }

                // Broadcast events
                Ok(event) = rx.recv() => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting event: {}", event_type);
                            yield Ok(Event::default()
                                .event(event_type)
                                .data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
