//! Standardization run state machine
//!
//! A run moves RUNNING → COMPLETED, or ends early as CANCELLED (user
//! stop) or FAILED (unrecoverable error). At most one run is active per
//! process; the worker owns the session value and persists it on every
//! transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Run lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    /// Batch loop is working through the subject roster
    Running,
    /// All subjects processed
    Completed,
    /// Stopped by user request
    Cancelled,
    /// Aborted on an unrecoverable error
    Failed,
}

/// State transition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// One standardization run (in-memory state, owned by the worker)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSession {
    /// Unique run identifier
    pub run_id: Uuid,

    /// Current lifecycle state
    pub state: RunState,

    /// Progress through the roster
    pub progress: RunProgress,

    /// Run start time
    pub started_at: DateTime<Utc>,

    /// Run end time (if completed/cancelled/failed)
    pub ended_at: Option<DateTime<Utc>>,
}

/// Progress tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    /// Subject currently being processed (display name)
    pub current_subject: Option<String>,

    /// 1-based question index within the current subject
    pub current_question: usize,

    /// Pending questions in the current subject
    pub total_questions: usize,

    /// Mappings written across all subjects so far
    pub processed_total: usize,

    /// Subjects finished so far
    pub subjects_completed: usize,

    /// Most recently mapped topic
    pub current_topic: Option<String>,

    /// Confidence of the most recent mapping
    pub confidence: Option<f64>,

    /// Elapsed time (seconds)
    pub elapsed_seconds: u64,
}

impl RunSession {
    /// Create a new run in the RUNNING state
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Running,
            progress: RunProgress::default(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state
    pub fn transition_to(&mut self, new_state: RunState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        // Set end time for terminal states
        match new_state {
            RunState::Completed | RunState::Cancelled | RunState::Failed => {
                self.ended_at = Some(Utc::now());
            }
            _ => {}
        }

        transition
    }

    /// Start working a new subject
    pub fn begin_subject(&mut self, display_name: &str, pending: usize) {
        self.progress.current_subject = Some(display_name.to_string());
        self.progress.current_question = 0;
        self.progress.total_questions = pending;
        self.refresh_elapsed();
    }

    /// Record one classification within the current subject
    pub fn record_classification(&mut self, index: usize, topic: &str, confidence: f64) {
        self.progress.current_question = index;
        self.progress.current_topic = Some(topic.to_string());
        self.progress.confidence = Some(confidence);
        self.refresh_elapsed();
    }

    /// Record one mapping written to the question table
    pub fn record_persisted(&mut self) {
        self.progress.processed_total += 1;
    }

    /// Finish the current subject
    pub fn complete_subject(&mut self) {
        self.progress.subjects_completed += 1;
        self.refresh_elapsed();
    }

    /// Check if the run is finished
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            RunState::Completed | RunState::Cancelled | RunState::Failed
        )
    }

    fn refresh_elapsed(&mut self) {
        self.progress.elapsed_seconds = (Utc::now() - self.started_at).num_seconds().max(0) as u64;
    }
}

impl Default for RunSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            current_subject: None,
            current_question: 0,
            total_questions: 0,
            processed_total: 0,
            subjects_completed: 0,
            current_topic: None,
            confidence: None,
            elapsed_seconds: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_running() {
        let session = RunSession::new();
        assert_eq!(session.state, RunState::Running);
        assert!(session.ended_at.is_none());
        assert!(!session.is_terminal());
        assert_eq!(session.progress.processed_total, 0);
    }

    #[test]
    fn test_transition_to_terminal_sets_ended_at() {
        let mut session = RunSession::new();
        let transition = session.transition_to(RunState::Completed);

        assert_eq!(transition.run_id, session.run_id);
        assert_eq!(transition.old_state, RunState::Running);
        assert_eq!(transition.new_state, RunState::Completed);
        assert_eq!(session.state, RunState::Completed);
        assert!(session.ended_at.is_some());
        assert!(session.is_terminal());
    }

    #[test]
    fn test_all_terminal_states() {
        for state in [RunState::Completed, RunState::Cancelled, RunState::Failed] {
            let mut session = RunSession::new();
            session.transition_to(state);
            assert!(session.is_terminal());
            assert!(session.ended_at.is_some());
        }
    }

    #[test]
    fn test_progress_accumulates_across_subjects() {
        let mut session = RunSession::new();

        session.begin_subject("Cardiology", 3);
        assert_eq!(session.progress.current_subject.as_deref(), Some("Cardiology"));
        assert_eq!(session.progress.total_questions, 3);
        assert_eq!(session.progress.current_question, 0);

        session.record_classification(1, "Heart Failure", 0.9);
        session.record_persisted();
        session.record_classification(2, "Arrhythmia", 0.8);
        session.record_persisted();
        session.complete_subject();

        session.begin_subject("Anatomy", 1);
        assert_eq!(session.progress.current_question, 0);
        session.record_classification(1, "Upper Limb", 0.7);
        session.record_persisted();
        session.complete_subject();

        assert_eq!(session.progress.processed_total, 3);
        assert_eq!(session.progress.subjects_completed, 2);
        assert_eq!(session.progress.current_topic.as_deref(), Some("Upper Limb"));
        assert_eq!(session.progress.confidence, Some(0.7));
    }

    #[test]
    fn test_state_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RunState::Running).unwrap(), "\"RUNNING\"");
        assert_eq!(serde_json::to_string(&RunState::Completed).unwrap(), "\"COMPLETED\"");
        assert_eq!(serde_json::to_string(&RunState::Cancelled).unwrap(), "\"CANCELLED\"");
        assert_eq!(serde_json::to_string(&RunState::Failed).unwrap(), "\"FAILED\"");
    }
}
