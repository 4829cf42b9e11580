//! Aggregated run status snapshot
//!
//! The batch worker never exposes its own state. A background task
//! subscribes to the event bus and folds events into this snapshot,
//! which `/status` serves directly and the SSE layer re-broadcasts on a
//! fixed tick. Counters carried in events are assigned, not incremented,
//! so a lagged subscriber cannot drift the totals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use qmap_common::events::{EventBus, QmapEvent};

use crate::models::run_session::RunState;

/// Dashboard log pane keeps the most recent entries only
const LOG_RING_CAPACITY: usize = 50;

/// One dashboard log line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock time, HH:MM:SS
    pub time: String,
    pub message: String,
}

/// Snapshot of the current (or most recent) run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStatus {
    pub is_running: bool,
    pub run_id: Option<Uuid>,
    pub state: Option<RunState>,
    pub current_subject: Option<String>,
    pub current_question: usize,
    pub total_questions: usize,
    pub processed_total: usize,
    pub subjects_completed: usize,
    pub current_topic: Option<String>,
    pub confidence: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub logs: Vec<LogEntry>,
}

impl RunStatus {
    /// Fold one event into the snapshot
    pub fn apply(&mut self, event: &QmapEvent) {
        match event {
            QmapEvent::RunStarted { run_id, timestamp } => {
                // fresh run: counters and logs start over
                *self = RunStatus {
                    is_running: true,
                    run_id: Some(*run_id),
                    state: Some(RunState::Running),
                    start_time: Some(*timestamp),
                    ..RunStatus::default()
                };
            }
            QmapEvent::SubjectStarted {
                display_name,
                pending,
                timestamp,
                ..
            } => {
                self.current_subject = Some(display_name.clone());
                self.current_question = 0;
                self.total_questions = *pending;
                self.note_elapsed(*timestamp);
            }
            QmapEvent::QuestionClassified {
                topic,
                confidence,
                current,
                total,
                processed_total,
                timestamp,
                ..
            } => {
                self.current_topic = Some(topic.clone());
                self.confidence = Some(*confidence);
                self.current_question = *current;
                self.total_questions = *total;
                self.processed_total = *processed_total;
                self.note_elapsed(*timestamp);
            }
            QmapEvent::SubjectCompleted {
                subjects_completed,
                timestamp,
                ..
            } => {
                self.subjects_completed = *subjects_completed;
                self.note_elapsed(*timestamp);
            }
            QmapEvent::RunCompleted {
                processed_total,
                duration_seconds,
                ..
            } => {
                self.is_running = false;
                self.state = Some(RunState::Completed);
                self.processed_total = *processed_total;
                self.elapsed_seconds = *duration_seconds;
            }
            QmapEvent::RunCancelled {
                processed_total,
                timestamp,
                ..
            } => {
                self.is_running = false;
                self.state = Some(RunState::Cancelled);
                self.processed_total = *processed_total;
                self.note_elapsed(*timestamp);
            }
            QmapEvent::RunFailed {
                processed_total,
                timestamp,
                ..
            } => {
                self.is_running = false;
                self.state = Some(RunState::Failed);
                self.processed_total = *processed_total;
                self.note_elapsed(*timestamp);
            }
            QmapEvent::LogLine { time, message } => {
                self.logs.push(LogEntry {
                    time: time.clone(),
                    message: message.clone(),
                });
                if self.logs.len() > LOG_RING_CAPACITY {
                    let excess = self.logs.len() - LOG_RING_CAPACITY;
                    self.logs.drain(..excess);
                }
            }
        }
    }

    /// Recompute elapsed time from the wall clock.
    ///
    /// Handlers call this before serving the snapshot so ticks between
    /// events do not show a stale value.
    pub fn refresh_elapsed(&mut self) {
        if self.is_running {
            if let Some(start) = self.start_time {
                self.elapsed_seconds = (Utc::now() - start).num_seconds().max(0) as u64;
            }
        }
    }

    fn note_elapsed(&mut self, at: DateTime<Utc>) {
        if let Some(start) = self.start_time {
            self.elapsed_seconds = (at - start).num_seconds().max(0) as u64;
        }
    }
}

/// Spawn the task that keeps a shared snapshot in sync with the bus.
///
/// Runs for the process lifetime. On lag it drops the missed events and
/// carries on; the next counter-bearing event restores accurate totals.
pub fn spawn_status_aggregator(
    event_bus: &EventBus,
    status: Arc<RwLock<RunStatus>>,
) -> tokio::task::JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    status.write().await.apply(&event);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Status aggregator lagged behind event bus");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
