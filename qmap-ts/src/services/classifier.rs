//! Taxonomy-constrained topic classification
//!
//! Builds a constrained prompt from the taxonomy, runs one completion,
//! scrapes a JSON verdict out of the reply, validates the chosen topic
//! against the taxonomy and falls back to the original label whenever
//! any stage misbehaves. `classify` is total: it always produces a
//! well-formed mapping and never surfaces an error to the batch loop.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::services::completion_client::CompletionBackend;
use crate::taxonomy::{TaxonomyIndex, TopicSet};

/// Question text sent to the model is capped at this many characters
/// (characters, not bytes; a code point is never split).
pub const QUESTION_EXCERPT_CHARS: usize = 600;

/// One question to classify
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub question_text: String,
    pub original_topic: String,
    pub subject_key: String,
}

/// Final mapping for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub topic_v2: String,
    pub subtopic_v2: Option<String>,
    pub reference_book_v2: String,
    pub confidence: f64,
}

/// Untrusted verdict scraped from the model reply.
///
/// Unknown fields (e.g. `reasoning`) are ignored; missing fields take
/// defaults so a sparse reply still reaches validation.
#[derive(Debug, Deserialize)]
struct ModelVerdict {
    #[serde(default)]
    is_cross_cutting: bool,
    #[serde(default)]
    main_topic: String,
    #[serde(default)]
    subtopic: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Maps exam questions onto the master taxonomy
pub struct TopicClassifier {
    taxonomy: Arc<TaxonomyIndex>,
    backend: Arc<dyn CompletionBackend>,
}

impl TopicClassifier {
    pub fn new(taxonomy: Arc<TaxonomyIndex>, backend: Arc<dyn CompletionBackend>) -> Self {
        Self { taxonomy, backend }
    }

    /// Map one question onto the taxonomy.
    ///
    /// Subjects with no topic list short-circuit to a "Not Standardized"
    /// result without touching the model. Everything downstream of the
    /// lookup (transport failure, unparseable reply, off-taxonomy topic
    /// choice) degrades to a fallback that keeps the original label.
    pub async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        let topic_set = self.taxonomy.lookup(&request.subject_key);

        if topic_set.subject_specific.is_empty() {
            return ClassificationResult {
                topic_v2: request.original_topic.clone(),
                subtopic_v2: None,
                reference_book_v2: "Not Standardized".to_string(),
                confidence: 0.0,
            };
        }

        let prompt = build_prompt(request, &topic_set);

        let raw = match self.backend.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    subject = %request.subject_key,
                    error = %e,
                    "Completion failed, keeping original topic"
                );
                return fallback_result(request, &topic_set);
            }
        };

        let candidate = extract_json_block(&raw);

        let verdict: ModelVerdict = match serde_json::from_str(candidate) {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(
                    subject = %request.subject_key,
                    error = %e,
                    "Unparseable completion, keeping original topic"
                );
                return fallback_result(request, &topic_set);
            }
        };

        let mut main_topic = verdict.main_topic;
        let mut confidence = verdict.confidence.unwrap_or(0.7);

        let is_valid = if verdict.is_cross_cutting {
            topic_set.is_cross_cutting_topic(&main_topic)
        } else {
            topic_set.is_subject_topic(&main_topic)
        };

        if !is_valid {
            tracing::debug!(
                subject = %request.subject_key,
                rejected = %main_topic,
                "Model chose a topic outside the taxonomy"
            );
            main_topic = request.original_topic.clone();
            confidence = 0.5;
        }

        ClassificationResult {
            topic_v2: main_topic,
            subtopic_v2: verdict.subtopic,
            reference_book_v2: topic_set
                .reference_book
                .unwrap_or("Master Taxonomy")
                .to_string(),
            confidence,
        }
    }
}

fn fallback_result(
    request: &ClassificationRequest,
    topic_set: &TopicSet<'_>,
) -> ClassificationResult {
    ClassificationResult {
        topic_v2: request.original_topic.clone(),
        subtopic_v2: None,
        reference_book_v2: topic_set.reference_book.unwrap_or("Unknown").to_string(),
        confidence: 0.5,
    }
}

fn build_prompt(request: &ClassificationRequest, topic_set: &TopicSet<'_>) -> String {
    let excerpt: String = request
        .question_text
        .chars()
        .take(QUESTION_EXCERPT_CHARS)
        .collect();

    let mut cross_cutting_lines: Vec<String> = Vec::new();
    for category in topic_set.cross_cutting {
        cross_cutting_lines.push(format!("**{}**", category.main_topic));
        for subtopic in &category.subtopics {
            cross_cutting_lines.push(format!("  - {}", subtopic));
        }
    }

    let subject_lines: Vec<String> = topic_set
        .subject_specific
        .iter()
        .map(|topic| format!("  - {}", topic))
        .collect();

    format!(
        r#"You are a medical education expert. Map this DNB question to the MOST APPROPRIATE topic from the predefined taxonomy below.

Question Text: {excerpt}
Original Topic Label: {original_topic}

AVAILABLE TOPICS (choose EXACTLY one):

A) CROSS-CUTTING TOPICS (preferred if question is about these areas):
{cross_cutting}

B) SUBJECT-SPECIFIC TOPICS ({subject}):
{subject_topics}

RULES:
1. If question is about research, statistics, ethics, quality - ALWAYS choose from Cross-Cutting Topics
2. Otherwise, choose from Subject-Specific Topics
3. Pick the MOST SPECIFIC topic that matches
4. Return ONLY valid JSON - no explanation

OUTPUT FORMAT (exact JSON only):
{{
  "is_cross_cutting": true/false,
  "main_topic": "exact topic name from list above",
  "subtopic": "more specific aspect if applicable or null",
  "confidence": 0.95,
  "reasoning": "one sentence why this topic"
}}"#,
        excerpt = excerpt,
        original_topic = request.original_topic,
        cross_cutting = cross_cutting_lines.join("\n"),
        subject = request.subject_key.to_uppercase(),
        subject_topics = subject_lines.join("\n"),
    )
}

/// Pull the JSON candidate out of a possibly fenced reply.
///
/// A `json`-tagged fence wins over a bare fence; an unterminated fence
/// runs to the end of the text. With no fence at all the whole trimmed
/// reply is the candidate.
fn extract_json_block(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        return match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }

    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        return match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }

    text
}
