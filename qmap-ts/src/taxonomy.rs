//! Master taxonomy index
//!
//! Loaded once at startup from a JSON document and shared behind `Arc`.
//! The document carries two sections: cross-cutting categories that apply
//! to every subject, and per-subject topic lists with an optional
//! reference book.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use qmap_common::{Error, Result};

/// One cross-cutting category: a main topic plus its subtopics
#[derive(Debug, Clone, Deserialize)]
pub struct CrossCuttingCategory {
    pub main_topic: String,
    pub subtopics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CrossCuttingSection {
    categories: Vec<CrossCuttingCategory>,
}

#[derive(Debug, Deserialize)]
struct SubjectEntry {
    topics: Vec<String>,
    #[serde(default)]
    reference_book: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubjectSection {
    subjects: HashMap<String, SubjectEntry>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyDocument {
    cross_cutting_topics: CrossCuttingSection,
    subject_specific_topics: SubjectSection,
}

#[derive(Debug)]
struct SubjectTopics {
    topics: Vec<String>,
    reference_book: Option<String>,
}

/// Immutable topic index built from the taxonomy document
#[derive(Debug)]
pub struct TaxonomyIndex {
    categories: Vec<CrossCuttingCategory>,
    subjects: HashMap<String, SubjectTopics>,
}

/// Borrowed view of the topics available to one subject
pub struct TopicSet<'a> {
    /// Cross-cutting categories, in document order (same for every subject)
    pub cross_cutting: &'a [CrossCuttingCategory],
    /// Subject-specific topics, empty for unknown subjects
    pub subject_specific: &'a [String],
    /// Reference book for the subject, if the document names one
    pub reference_book: Option<&'a str>,
}

impl TaxonomyIndex {
    /// Load the taxonomy document from disk.
    ///
    /// Any malformation (unreadable file, invalid JSON, schema mismatch)
    /// is a configuration error; callers treat it as fatal at startup.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read taxonomy file {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
            .map_err(|e| Error::Config(format!("in taxonomy file {}: {}", path.display(), e)))
    }

    /// Build the index from raw JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        let document: TaxonomyDocument = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("invalid taxonomy document: {}", e)))?;

        let subjects = document
            .subject_specific_topics
            .subjects
            .into_iter()
            .map(|(key, entry)| {
                (
                    key,
                    SubjectTopics {
                        topics: entry.topics,
                        reference_book: entry.reference_book,
                    },
                )
            })
            .collect();

        Ok(Self {
            categories: document.cross_cutting_topics.categories,
            subjects,
        })
    }

    /// Topics available when classifying a question from `subject_key`.
    ///
    /// Unknown keys are normal input: the cross-cutting list is still
    /// returned in full and `subject_specific` is empty.
    pub fn lookup(&self, subject_key: &str) -> TopicSet<'_> {
        match self.subjects.get(subject_key) {
            Some(subject) => TopicSet {
                cross_cutting: &self.categories,
                subject_specific: &subject.topics,
                reference_book: subject.reference_book.as_deref(),
            },
            None => TopicSet {
                cross_cutting: &self.categories,
                subject_specific: &[],
                reference_book: None,
            },
        }
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.len()
    }
}

impl TopicSet<'_> {
    /// True when `name` matches a category main topic or one of its subtopics.
    pub fn is_cross_cutting_topic(&self, name: &str) -> bool {
        self.cross_cutting
            .iter()
            .any(|c| c.main_topic == name || c.subtopics.iter().any(|s| s == name))
    }

    /// True when `name` is one of the subject-specific topics.
    pub fn is_subject_topic(&self, name: &str) -> bool {
        self.subject_specific.iter().any(|t| t == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> &'static str {
        r#"{
            "cross_cutting_topics": {
                "categories": [
                    {
                        "main_topic": "Research & Statistics",
                        "subtopics": ["p-values", "Study Designs", "Bias"]
                    },
                    {
                        "main_topic": "Medical Ethics",
                        "subtopics": ["Consent", "Confidentiality"]
                    }
                ]
            },
            "subject_specific_topics": {
                "subjects": {
                    "cardio": {
                        "topics": ["Heart Failure", "Arrhythmias", "Ischemic Heart Disease"],
                        "reference_book": "Braunwald"
                    },
                    "anat": {
                        "topics": ["Upper Limb", "Thorax"]
                    }
                }
            }
        }"#
    }

    #[test]
    fn test_lookup_known_subject() {
        let index = TaxonomyIndex::from_json(sample_document()).unwrap();
        let set = index.lookup("cardio");
        assert_eq!(set.subject_specific.len(), 3);
        assert_eq!(set.reference_book, Some("Braunwald"));
        assert_eq!(set.cross_cutting.len(), 2);
        assert_eq!(set.cross_cutting[0].main_topic, "Research & Statistics");
    }

    #[test]
    fn test_lookup_unknown_subject_is_empty_not_error() {
        let index = TaxonomyIndex::from_json(sample_document()).unwrap();
        let set = index.lookup("astrology");
        assert!(set.subject_specific.is_empty());
        assert!(set.reference_book.is_none());
        // cross-cutting list is global and still present
        assert_eq!(set.cross_cutting.len(), 2);
    }

    #[test]
    fn test_subject_without_reference_book() {
        let index = TaxonomyIndex::from_json(sample_document()).unwrap();
        let set = index.lookup("anat");
        assert_eq!(set.subject_specific.len(), 2);
        assert!(set.reference_book.is_none());
    }

    #[test]
    fn test_cross_cutting_match_accepts_main_topic_and_subtopics() {
        let index = TaxonomyIndex::from_json(sample_document()).unwrap();
        let set = index.lookup("cardio");
        assert!(set.is_cross_cutting_topic("Research & Statistics"));
        assert!(set.is_cross_cutting_topic("p-values"));
        assert!(set.is_cross_cutting_topic("Consent"));
        assert!(!set.is_cross_cutting_topic("Heart Failure"));
        assert!(!set.is_cross_cutting_topic("Astrology"));
    }

    #[test]
    fn test_subject_topic_membership() {
        let index = TaxonomyIndex::from_json(sample_document()).unwrap();
        let set = index.lookup("cardio");
        assert!(set.is_subject_topic("Heart Failure"));
        assert!(!set.is_subject_topic("p-values"));
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        let err = TaxonomyIndex::from_json(r#"{"cross_cutting_topics": {}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = TaxonomyIndex::from_json("not json at all").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = TaxonomyIndex::load(Path::new("/nonexistent/taxonomy.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_counts() {
        let index = TaxonomyIndex::from_json(sample_document()).unwrap();
        assert_eq!(index.category_count(), 2);
        assert_eq!(index.subject_count(), 2);
    }
}
