//! Event types for the qmap event system
//!
//! Provides shared event definitions and the EventBus used to fan run
//! progress out to the status aggregator and SSE clients.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// qmap event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. Counters carried in events are authoritative: consumers
/// assign them rather than incrementing local copies, so a lagged
/// subscriber cannot drift the totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QmapEvent {
    /// Standardization run started
    ///
    /// Triggers:
    /// - Status aggregator: reset the snapshot for a fresh run
    /// - SSE: show run-in-progress UI
    RunStarted {
        /// Run identifier
        run_id: Uuid,
        /// When the run started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Worker moved on to the next subject in the roster
    SubjectStarted {
        /// Run identifier
        run_id: Uuid,
        /// Subject key (e.g. "cardio")
        subject_key: String,
        /// Human-readable subject name (e.g. "Cardiology")
        display_name: String,
        /// Number of pending questions fetched for this subject
        pending: usize,
        /// When the subject was entered
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One question classified and persisted (or persist attempted)
    ///
    /// Emitted once per question; carries the counters the dashboard shows.
    QuestionClassified {
        /// Run identifier
        run_id: Uuid,
        /// Subject key the question belongs to
        subject_key: String,
        /// Question row id
        question_id: i64,
        /// Chosen topic (taxonomy-valid or the original label)
        topic: String,
        /// Confidence reported for the mapping
        confidence: f64,
        /// 1-based index within the current subject
        current: usize,
        /// Pending questions in the current subject
        total: usize,
        /// Questions persisted across the whole run
        processed_total: usize,
        /// When the classification finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// All pending questions of a subject handled
    SubjectCompleted {
        /// Run identifier
        run_id: Uuid,
        /// Subject key
        subject_key: String,
        /// Questions handled in this subject
        processed: usize,
        /// Subjects completed so far in the run
        subjects_completed: usize,
        /// When the subject finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run finished after the full roster
    RunCompleted {
        /// Run identifier
        run_id: Uuid,
        /// Questions persisted across the run
        processed_total: usize,
        /// Wall-clock run duration in seconds
        duration_seconds: u64,
        /// When the run completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run stopped by user request
    RunCancelled {
        /// Run identifier
        run_id: Uuid,
        /// Questions persisted before cancellation
        processed_total: usize,
        /// When the cancellation took effect
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Run aborted on an unrecoverable error (e.g. a failed fetch)
    RunFailed {
        /// Run identifier
        run_id: Uuid,
        /// Error message details
        error_message: String,
        /// Questions persisted before the failure
        processed_total: usize,
        /// When the failure occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Human-readable progress line for the dashboard log pane
    LogLine {
        /// Wall-clock time, HH:MM:SS
        time: String,
        /// Log text
        message: String,
    },
}

impl QmapEvent {
    /// Get event type as string for SSE event naming and filtering
    pub fn event_type(&self) -> &str {
        match self {
            QmapEvent::RunStarted { .. } => "RunStarted",
            QmapEvent::SubjectStarted { .. } => "SubjectStarted",
            QmapEvent::QuestionClassified { .. } => "QuestionClassified",
            QmapEvent::SubjectCompleted { .. } => "SubjectCompleted",
            QmapEvent::RunCompleted { .. } => "RunCompleted",
            QmapEvent::RunCancelled { .. } => "RunCancelled",
            QmapEvent::RunFailed { .. } => "RunFailed",
            QmapEvent::LogLine { .. } => "LogLine",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<QmapEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Events beyond capacity displace the oldest unread ones; slow
    /// subscribers observe a Lagged error and continue from the newest.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<QmapEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: QmapEvent,
    ) -> Result<usize, broadcast::error::SendError<QmapEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Used for events where a missing listener is acceptable (the run
    /// happily proceeds with no dashboard attached).
    pub fn emit_lossy(&self, event: QmapEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> QmapEvent {
        QmapEvent::RunStarted {
            run_id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_eventbus_emit_delivers() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        bus.emit(sample_event()).expect("emit should succeed");

        let received = rx.try_recv().expect("should receive event");
        assert_eq!(received.event_type(), "RunStarted");
    }

    #[test]
    fn test_eventbus_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(sample_event()).is_err());
        // Lossy emit never errors
        bus.emit_lossy(sample_event());
    }

    #[test]
    fn test_eventbus_emit_lossy_on_full_channel() {
        let bus = EventBus::new(2);
        let mut _rx = bus.subscribe(); // subscribe but don't receive

        for _ in 0..10 {
            bus.emit_lossy(sample_event());
        }

        assert_eq!(bus.capacity(), 2);
    }

    #[test]
    fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(QmapEvent::LogLine {
            time: "12:00:00".to_string(),
            message: "hello".to_string(),
        })
        .expect("emit should succeed");

        assert_eq!(rx1.try_recv().unwrap().event_type(), "LogLine");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "LogLine");
    }

    #[test]
    fn test_event_serialization_tags_type() {
        let event = QmapEvent::QuestionClassified {
            run_id: Uuid::new_v4(),
            subject_key: "cardio".to_string(),
            question_id: 7,
            topic: "Heart Failure".to_string(),
            confidence: 0.9,
            current: 3,
            total: 10,
            processed_total: 3,
            timestamp: chrono::Utc::now(),
        };

        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"type\":\"QuestionClassified\""));
        assert!(json.contains("\"subject_key\":\"cardio\""));
        assert!(json.contains("\"processed_total\":3"));

        let back: QmapEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.event_type(), "QuestionClassified");
    }

    #[test]
    fn test_event_type_for_all_variants() {
        let run_id = Uuid::new_v4();
        let ts = chrono::Utc::now();
        let events = vec![
            (
                QmapEvent::RunStarted {
                    run_id,
                    timestamp: ts,
                },
                "RunStarted",
            ),
            (
                QmapEvent::SubjectStarted {
                    run_id,
                    subject_key: "anat".to_string(),
                    display_name: "Anatomy".to_string(),
                    pending: 12,
                    timestamp: ts,
                },
                "SubjectStarted",
            ),
            (
                QmapEvent::SubjectCompleted {
                    run_id,
                    subject_key: "anat".to_string(),
                    processed: 12,
                    subjects_completed: 1,
                    timestamp: ts,
                },
                "SubjectCompleted",
            ),
            (
                QmapEvent::RunCompleted {
                    run_id,
                    processed_total: 12,
                    duration_seconds: 30,
                    timestamp: ts,
                },
                "RunCompleted",
            ),
            (
                QmapEvent::RunCancelled {
                    run_id,
                    processed_total: 5,
                    timestamp: ts,
                },
                "RunCancelled",
            ),
            (
                QmapEvent::RunFailed {
                    run_id,
                    error_message: "db gone".to_string(),
                    processed_total: 5,
                    timestamp: ts,
                },
                "RunFailed",
            ),
        ];

        for (event, expected) in events {
            assert_eq!(event.event_type(), expected);
        }
    }
}
