//! Database access for qmap-ts
//!
//! One SQLite file owned by the service: a question table per subject in
//! the roster plus the standardization_runs bookkeeping table.

pub mod questions;
pub mod runs;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

use crate::subjects::SUBJECTS;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the run bookkeeping table and one question table per subject
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS standardization_runs (
            run_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            current_subject TEXT,
            current_question INTEGER NOT NULL DEFAULT 0,
            total_questions INTEGER NOT NULL DEFAULT 0,
            processed_total INTEGER NOT NULL DEFAULT 0,
            subjects_completed INTEGER NOT NULL DEFAULT 0,
            current_topic TEXT,
            confidence REAL,
            started_at TEXT NOT NULL,
            ended_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Table names come from the static roster, never from user input
    for subject in SUBJECTS {
        let create = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                question_text TEXT,
                topic TEXT,
                topic_v2 TEXT,
                subtopic_v2 TEXT,
                reference_book_v2 TEXT,
                ai_confidence_score REAL
            )
            "#,
            subject.table_name
        );
        sqlx::query(&create).execute(pool).await?;
    }

    tracing::info!(
        subject_tables = SUBJECTS.len(),
        "Database tables initialized (standardization_runs, question tables)"
    );

    Ok(())
}
