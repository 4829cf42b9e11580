//! Batch standardization worker
//!
//! Walks the subject roster in order, classifies pending questions one at
//! a time and writes mappings back. The worker owns its `RunSession`;
//! progress leaves it only as events on the bus. Between completion calls
//! it sleeps per the pacing policy, a quota courtesy owed to the
//! generation service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use qmap_common::events::{EventBus, QmapEvent};
use qmap_common::Result;

use crate::db::{questions, runs};
use crate::models::{RunSession, RunState};
use crate::services::classifier::{ClassificationRequest, TopicClassifier};
use crate::subjects::SUBJECTS;

/// Sleep schedule between completion calls
#[derive(Debug, Clone)]
pub struct PacingPolicy {
    /// Pause after a typical question
    pub between_calls: Duration,
    /// Every nth question in a subject takes the long pause instead
    pub long_pause_every: usize,
    /// The long pause
    pub long_pause: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            between_calls: Duration::from_secs(2),
            long_pause_every: 25,
            long_pause: Duration::from_secs(60),
        }
    }
}

impl PacingPolicy {
    /// No sleeping at all, for tests
    pub fn none() -> Self {
        Self {
            between_calls: Duration::ZERO,
            long_pause_every: 25,
            long_pause: Duration::ZERO,
        }
    }

    fn pause_after(&self, index: usize) -> Duration {
        if self.long_pause_every > 0 && index % self.long_pause_every == 0 {
            self.long_pause
        } else {
            self.between_calls
        }
    }
}

/// Batch worker for one standardization run
pub struct Standardizer {
    db: SqlitePool,
    event_bus: EventBus,
    classifier: Arc<TopicClassifier>,
    pacing: PacingPolicy,
}

impl Standardizer {
    pub fn new(db: SqlitePool, event_bus: EventBus, classifier: Arc<TopicClassifier>) -> Self {
        Self::with_pacing(db, event_bus, classifier, PacingPolicy::default())
    }

    pub fn with_pacing(
        db: SqlitePool,
        event_bus: EventBus,
        classifier: Arc<TopicClassifier>,
        pacing: PacingPolicy,
    ) -> Self {
        Self {
            db,
            event_bus,
            classifier,
            pacing,
        }
    }

    /// Drive a run to a terminal state and return the final session.
    ///
    /// Cancellation is honored between subjects, between questions and
    /// during pacing sleeps; the in-flight classification always finishes
    /// and its mapping is written before the token is observed.
    pub async fn run(
        &self,
        mut session: RunSession,
        cancel: CancellationToken,
    ) -> Result<RunSession> {
        let run_id = session.run_id;

        self.event_bus.emit_lossy(QmapEvent::RunStarted {
            run_id,
            timestamp: session.started_at,
        });
        self.log("🚀 Started topic standardization process");
        self.save_progress(&session).await;

        tracing::info!(run_id = %run_id, subjects = SUBJECTS.len(), "Standardization run started");

        let mut cancelled = false;

        for subject in SUBJECTS {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.log(format!("📚 Processing {}...", subject.display_name));

            let pending = match questions::fetch_pending(&self.db, subject.table_name).await {
                Ok(pending) => pending,
                Err(e) => {
                    tracing::error!(
                        run_id = %run_id,
                        subject = subject.key,
                        error = %e,
                        "Failed to fetch pending questions, aborting run"
                    );
                    self.log(format!("💥 Run failed on {}: {}", subject.display_name, e));
                    session.transition_to(RunState::Failed);
                    self.event_bus.emit_lossy(QmapEvent::RunFailed {
                        run_id,
                        error_message: e.to_string(),
                        processed_total: session.progress.processed_total,
                        timestamp: Utc::now(),
                    });
                    self.save_progress(&session).await;
                    return Err(e);
                }
            };

            let total = pending.len();
            session.begin_subject(subject.display_name, total);
            self.event_bus.emit_lossy(QmapEvent::SubjectStarted {
                run_id,
                subject_key: subject.key.to_string(),
                display_name: subject.display_name.to_string(),
                pending: total,
                timestamp: Utc::now(),
            });

            if pending.is_empty() {
                self.log(format!("✓ {}: No questions to process", subject.display_name));
                session.complete_subject();
                self.event_bus.emit_lossy(QmapEvent::SubjectCompleted {
                    run_id,
                    subject_key: subject.key.to_string(),
                    processed: 0,
                    subjects_completed: session.progress.subjects_completed,
                    timestamp: Utc::now(),
                });
                continue;
            }

            let mut interrupted = false;

            for (i, question) in pending.iter().enumerate() {
                if cancel.is_cancelled() {
                    interrupted = true;
                    break;
                }

                let index = i + 1;

                let request = ClassificationRequest {
                    question_text: question.question_text.clone(),
                    original_topic: question.topic.clone(),
                    subject_key: subject.key.to_string(),
                };
                let mapping = self.classifier.classify(&request).await;

                session.record_classification(index, &mapping.topic_v2, mapping.confidence);

                match questions::apply_mapping(&self.db, subject.table_name, question.id, &mapping)
                    .await
                {
                    Ok(()) => session.record_persisted(),
                    Err(e) => {
                        tracing::warn!(
                            run_id = %run_id,
                            subject = subject.key,
                            question_id = question.id,
                            error = %e,
                            "Failed to write mapping"
                        );
                        self.log(format!("❌ Error updating Q#{}: {}", question.id, e));
                    }
                }

                self.event_bus.emit_lossy(QmapEvent::QuestionClassified {
                    run_id,
                    subject_key: subject.key.to_string(),
                    question_id: question.id,
                    topic: mapping.topic_v2.clone(),
                    confidence: mapping.confidence,
                    current: index,
                    total,
                    processed_total: session.progress.processed_total,
                    timestamp: Utc::now(),
                });
                self.save_progress(&session).await;

                let pause = self.pacing.pause_after(index);
                if !pause.is_zero() {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            interrupted = true;
                            break;
                        }
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
            }

            if interrupted {
                cancelled = true;
                break;
            }

            session.complete_subject();
            self.event_bus.emit_lossy(QmapEvent::SubjectCompleted {
                run_id,
                subject_key: subject.key.to_string(),
                processed: total,
                subjects_completed: session.progress.subjects_completed,
                timestamp: Utc::now(),
            });
            self.log(format!(
                "✅ {} complete: {} questions processed",
                subject.display_name, total
            ));
            self.save_progress(&session).await;
        }

        if cancelled {
            session.transition_to(RunState::Cancelled);
            self.event_bus.emit_lossy(QmapEvent::RunCancelled {
                run_id,
                processed_total: session.progress.processed_total,
                timestamp: Utc::now(),
            });
            self.log("🛑 Run stopped by user");
            tracing::info!(
                run_id = %run_id,
                processed = session.progress.processed_total,
                "Standardization run cancelled"
            );
        } else {
            session.transition_to(RunState::Completed);
            let duration_seconds = (Utc::now() - session.started_at).num_seconds().max(0) as u64;
            self.event_bus.emit_lossy(QmapEvent::RunCompleted {
                run_id,
                processed_total: session.progress.processed_total,
                duration_seconds,
                timestamp: Utc::now(),
            });
            self.log("🎉 All subjects processed!");
            tracing::info!(
                run_id = %run_id,
                processed = session.progress.processed_total,
                "Standardization run completed"
            );
        }

        runs::save_run(&self.db, &session).await?;

        Ok(session)
    }

    /// Best-effort progress save; a locked database must not kill the run
    async fn save_progress(&self, session: &RunSession) {
        if let Err(e) = runs::save_run(&self.db, session).await {
            tracing::warn!(run_id = %session.run_id, error = %e, "Failed to save run progress");
        }
    }

    fn log(&self, message: impl Into<String>) {
        self.event_bus.emit_lossy(QmapEvent::LogLine {
            time: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_tables;
    use crate::services::completion_client::{CompletionBackend, CompletionError};
    use crate::taxonomy::TaxonomyIndex;
    use async_trait::async_trait;

    struct FixedBackend(String);

    #[async_trait]
    impl CompletionBackend for FixedBackend {
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, CompletionError> {
            Ok(self.0.clone())
        }
    }

    fn test_classifier(reply: &str) -> Arc<TopicClassifier> {
        let taxonomy = Arc::new(
            TaxonomyIndex::from_json(
                r#"{
                    "cross_cutting_topics": {"categories": []},
                    "subject_specific_topics": {
                        "subjects": {
                            "cardio": {
                                "topics": ["Heart Failure"],
                                "reference_book": "Braunwald"
                            }
                        }
                    }
                }"#,
            )
            .unwrap(),
        );
        Arc::new(TopicClassifier::new(
            taxonomy,
            Arc::new(FixedBackend(reply.to_string())),
        ))
    }

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.expect("connect");
        init_tables(&pool).await.expect("init tables");
        pool
    }

    #[test]
    fn test_pacing_schedule() {
        let pacing = PacingPolicy::default();
        assert_eq!(pacing.pause_after(1), Duration::from_secs(2));
        assert_eq!(pacing.pause_after(24), Duration::from_secs(2));
        assert_eq!(pacing.pause_after(25), Duration::from_secs(60));
        assert_eq!(pacing.pause_after(26), Duration::from_secs(2));
        assert_eq!(pacing.pause_after(50), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_run_completes_and_writes_mappings() {
        let pool = test_pool().await;
        for id in 1..=2 {
            sqlx::query("INSERT INTO cardio_questions (id, question_text, topic) VALUES (?, ?, ?)")
                .bind(id)
                .bind(format!("Question {}", id))
                .bind("Old Label")
                .execute(&pool)
                .await
                .unwrap();
        }

        let bus = EventBus::new(256);
        let mut rx = bus.subscribe();
        let classifier = test_classifier(
            r#"{"is_cross_cutting": false, "main_topic": "Heart Failure", "confidence": 0.9}"#,
        );
        let worker =
            Standardizer::with_pacing(pool.clone(), bus.clone(), classifier, PacingPolicy::none());

        let session = worker
            .run(RunSession::new(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(session.state, RunState::Completed);
        assert_eq!(session.progress.processed_total, 2);
        assert_eq!(session.progress.subjects_completed, SUBJECTS.len());

        // both rows mapped
        let remaining = questions::fetch_pending(&pool, "cardio_questions")
            .await
            .unwrap();
        assert!(remaining.is_empty());

        // the saved row is terminal
        let loaded = runs::load_run(&pool, session.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, RunState::Completed);
        assert_eq!(loaded.progress.processed_total, 2);

        // event stream carried the classifications and the terminal event
        let mut classified = 0;
        let mut completed = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                QmapEvent::QuestionClassified { topic, .. } => {
                    classified += 1;
                    assert_eq!(topic, "Heart Failure");
                }
                QmapEvent::RunCompleted {
                    processed_total, ..
                } => {
                    completed += 1;
                    assert_eq!(processed_total, 2);
                }
                _ => {}
            }
        }
        assert_eq!(classified, 2);
        assert_eq!(completed, 1);
    }

    #[tokio::test]
    async fn test_precancelled_token_ends_run_as_cancelled() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO cardio_questions (id, question_text, topic) VALUES (1, 'Q', 'Old')")
            .execute(&pool)
            .await
            .unwrap();

        let bus = EventBus::new(64);
        let classifier = test_classifier(
            r#"{"is_cross_cutting": false, "main_topic": "Heart Failure", "confidence": 0.9}"#,
        );
        let worker =
            Standardizer::with_pacing(pool.clone(), bus, classifier, PacingPolicy::none());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let session = worker.run(RunSession::new(), cancel).await.unwrap();

        assert_eq!(session.state, RunState::Cancelled);
        assert_eq!(session.progress.processed_total, 0);
        assert_eq!(session.progress.subjects_completed, 0);
        assert!(session.ended_at.is_some());

        // nothing was classified
        let remaining = questions::fetch_pending(&pool, "cardio_questions")
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);

        let loaded = runs::load_run(&pool, session.run_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, RunState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_during_pacing_stops_between_questions() {
        let pool = test_pool().await;
        for id in 1..=5 {
            sqlx::query("INSERT INTO cardio_questions (id, question_text, topic) VALUES (?, 'Q', 'Old')")
                .bind(id)
                .execute(&pool)
                .await
                .unwrap();
        }

        let bus = EventBus::new(64);
        let classifier = test_classifier(
            r#"{"is_cross_cutting": false, "main_topic": "Heart Failure", "confidence": 0.9}"#,
        );
        // long enough that the run parks in the pacing sleep
        let pacing = PacingPolicy {
            between_calls: Duration::from_secs(30),
            long_pause_every: 25,
            long_pause: Duration::from_secs(30),
        };
        let worker = Standardizer::with_pacing(pool.clone(), bus, classifier, pacing);

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            let session = RunSession::new();
            tokio::spawn(async move { worker.run(session, cancel).await })
        };

        // let the first question finish, then stop
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();

        let session = handle.await.unwrap().unwrap();
        assert_eq!(session.state, RunState::Cancelled);
        assert!(session.progress.processed_total >= 1);
        assert!(session.progress.processed_total < 5);
    }
}
