//! Question table operations
//!
//! Every subject has its own `<key>_questions` table with the same
//! columns. A row is pending while `topic_v2` is NULL; writing a mapping
//! fills the four v2 columns and takes the row out of the pending set.

use sqlx::{Row, SqlitePool};

use qmap_common::Result;

use crate::services::classifier::ClassificationResult;

/// Per-subject cap on pending questions fetched for one run
pub const FETCH_LIMIT: i64 = 10_000;

/// One unmapped question row
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    pub id: i64,
    pub question_text: String,
    pub topic: String,
}

/// Fetch questions that have not been standardized yet
pub async fn fetch_pending(pool: &SqlitePool, table_name: &str) -> Result<Vec<PendingQuestion>> {
    let query = format!(
        "SELECT id, question_text, topic FROM {} WHERE topic_v2 IS NULL ORDER BY id LIMIT ?",
        table_name
    );

    let rows = sqlx::query(&query).bind(FETCH_LIMIT).fetch_all(pool).await?;

    let questions = rows
        .into_iter()
        .map(|row| PendingQuestion {
            id: row.get("id"),
            question_text: row
                .get::<Option<String>, _>("question_text")
                .unwrap_or_default(),
            topic: row.get::<Option<String>, _>("topic").unwrap_or_default(),
        })
        .collect();

    Ok(questions)
}

/// Write one mapping back to its question row
pub async fn apply_mapping(
    pool: &SqlitePool,
    table_name: &str,
    question_id: i64,
    mapping: &ClassificationResult,
) -> Result<()> {
    let query = format!(
        "UPDATE {} SET topic_v2 = ?, subtopic_v2 = ?, reference_book_v2 = ?, ai_confidence_score = ? WHERE id = ?",
        table_name
    );

    sqlx::query(&query)
        .bind(&mapping.topic_v2)
        .bind(&mapping.subtopic_v2)
        .bind(&mapping.reference_book_v2)
        .bind(mapping.confidence)
        .bind(question_id)
        .execute(pool)
        .await?;

    Ok(())
}
