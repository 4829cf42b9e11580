//! Standardization run persistence
//!
//! Each run is one row in `standardization_runs`, UPSERTed on every state
//! transition and periodically on progress. The state column stores the
//! serde form of `RunState` (quoted UPPERCASE).

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use qmap_common::{Error, Result};

use crate::models::{RunProgress, RunSession, RunState};

/// Save a run to the database (insert or update)
pub async fn save_run(pool: &SqlitePool, session: &RunSession) -> Result<()> {
    let run_id = session.run_id.to_string();
    let state = serde_json::to_string(&session.state)
        .map_err(|e| Error::Internal(format!("Failed to serialize state: {}", e)))?;
    let started_at = session.started_at.to_rfc3339();
    let ended_at = session.ended_at.map(|dt| dt.to_rfc3339());
    let current_question = session.progress.current_question as i64;
    let total_questions = session.progress.total_questions as i64;
    let processed_total = session.progress.processed_total as i64;
    let subjects_completed = session.progress.subjects_completed as i64;

    sqlx::query(
        r#"
        INSERT INTO standardization_runs (
            run_id, state, current_subject, current_question, total_questions,
            processed_total, subjects_completed, current_topic, confidence,
            started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(run_id) DO UPDATE SET
            state = excluded.state,
            current_subject = excluded.current_subject,
            current_question = excluded.current_question,
            total_questions = excluded.total_questions,
            processed_total = excluded.processed_total,
            subjects_completed = excluded.subjects_completed,
            current_topic = excluded.current_topic,
            confidence = excluded.confidence,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(&run_id)
    .bind(&state)
    .bind(&session.progress.current_subject)
    .bind(current_question)
    .bind(total_questions)
    .bind(processed_total)
    .bind(subjects_completed)
    .bind(&session.progress.current_topic)
    .bind(session.progress.confidence)
    .bind(&started_at)
    .bind(&ended_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a run from the database
pub async fn load_run(pool: &SqlitePool, run_id: Uuid) -> Result<Option<RunSession>> {
    let row = sqlx::query(
        r#"
        SELECT state, current_subject, current_question, total_questions,
               processed_total, subjects_completed, current_topic, confidence,
               started_at, ended_at
        FROM standardization_runs
        WHERE run_id = ?
        "#,
    )
    .bind(run_id.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let state: String = row.get("state");
            let state: RunState = serde_json::from_str(&state)
                .map_err(|e| Error::Internal(format!("Failed to deserialize state: {}", e)))?;

            let started_at: String = row.get("started_at");
            let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
                .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
                .with_timezone(&chrono::Utc);

            let ended_at: Option<String> = row.get("ended_at");
            let ended_at = ended_at
                .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
                .transpose()
                .map_err(|e| Error::Internal(format!("Failed to parse ended_at: {}", e)))?
                .map(|dt| dt.with_timezone(&chrono::Utc));

            let elapsed_seconds = if let Some(end) = ended_at {
                (end - started_at).num_seconds().max(0) as u64
            } else {
                (chrono::Utc::now() - started_at).num_seconds().max(0) as u64
            };

            let progress = RunProgress {
                current_subject: row.get("current_subject"),
                current_question: row.get::<i64, _>("current_question") as usize,
                total_questions: row.get::<i64, _>("total_questions") as usize,
                processed_total: row.get::<i64, _>("processed_total") as usize,
                subjects_completed: row.get::<i64, _>("subjects_completed") as usize,
                current_topic: row.get("current_topic"),
                confidence: row.get("confidence"),
                elapsed_seconds,
            };

            Ok(Some(RunSession {
                run_id,
                state,
                progress,
                started_at,
                ended_at,
            }))
        }
        None => Ok(None),
    }
}

/// Check whether any run is still in a non-terminal state
pub async fn has_running_run(pool: &SqlitePool) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM standardization_runs
        WHERE state NOT IN ('"COMPLETED"', '"CANCELLED"', '"FAILED"')
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

/// Mark runs left in a non-terminal state as cancelled.
///
/// Called at startup for rows left by a dead process, and from the start
/// guard for rows whose terminal save failed.
pub async fn cleanup_stale_runs(pool: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE standardization_runs
        SET state = '"CANCELLED"', ended_at = ?
        WHERE state NOT IN ('"COMPLETED"', '"CANCELLED"', '"FAILED"')
        "#,
    )
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
