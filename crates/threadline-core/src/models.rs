//! Core data models used throughout Threadline.
//!
//! These types represent the units, evaluations, suggestions, documents and
//! notes that flow through the analysis pipeline. Serialized field names are
//! camelCase, matching the JSON shapes exchanged with the generation backend
//! and persisted by the document stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One blank-line-delimited segment of raw input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    pub text: String,
}

impl TextUnit {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// How a unit relates to the unit immediately before it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrevLink {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub narrative_progression: String,
    /// Whether this unit continues the previous unit's thread.
    /// Has no meaning for the first unit.
    pub is_relevant: bool,
}

/// Structured per-unit analysis, one per [`TextUnit`] in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitEvaluation {
    pub text: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub narrative_style: String,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub logic: String,
    #[serde(default)]
    pub emotion: String,
    #[serde(default)]
    pub needs: Vec<String>,
    #[serde(default)]
    pub critical_question: String,
    pub prev: PrevLink,
}

/// A maximal run of consecutive evaluations judged mutually continuous.
///
/// Never empty: every element after the first has `prev.is_relevant == true`.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeGroup {
    evaluations: Vec<UnitEvaluation>,
}

impl NarrativeGroup {
    /// Builds a group from a non-empty run; returns `None` for an empty one.
    pub fn new(evaluations: Vec<UnitEvaluation>) -> Option<Self> {
        if evaluations.is_empty() {
            None
        } else {
            Some(Self { evaluations })
        }
    }

    pub fn evaluations(&self) -> &[UnitEvaluation] {
        &self.evaluations
    }

    pub fn len(&self) -> usize {
        self.evaluations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluations.is_empty()
    }

    /// Newline-joined unit texts; the canonical source text of a suggestion.
    pub fn source_text(&self) -> String {
        self.evaluations
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionIdea {
    pub approach: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub novelty: Vec<String>,
}

/// A titled insight synthesized from one [`NarrativeGroup`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub title: String,
    #[serde(default)]
    pub problems: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
    #[serde(default)]
    pub solution_ideas: Vec<SolutionIdea>,
    #[serde(default)]
    pub duration_category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub logic: String,
    #[serde(default)]
    pub inquiry_topics: Vec<String>,
    #[serde(default)]
    pub inquiry_keywords: Vec<String>,
    /// Newline-joined texts of the source group.
    pub text: String,
    pub updated_at: DateTime<Utc>,
    /// Documents confirmed as useful for this suggestion, in rank order.
    #[serde(default)]
    pub related_document_ids: Vec<String>,
}

impl Suggestion {
    /// Texts embedded to search the document corpus: inquiry topics, then
    /// inquiry keywords. Falls back to the title when both are empty.
    pub fn inquiry_texts(&self) -> Vec<String> {
        let texts: Vec<String> = self
            .inquiry_topics
            .iter()
            .chain(self.inquiry_keywords.iter())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if texts.is_empty() && !self.title.trim().is_empty() {
            vec![self.title.trim().to_string()]
        } else {
            texts
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    #[default]
    Completed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Completed => "completed",
        }
    }
}

/// A stored document. Note analysis only reads documents; they are written
/// by import and by [`crate::pipeline::NotePipeline::add_document`].
///
/// One document may carry several embeddings, e.g. one per derived fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category: String,
    /// Source text the analysis was derived from.
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub knowledge: Vec<String>,
    #[serde(default)]
    pub reading_contexts: Vec<String>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub insights: Vec<String>,
    #[serde(default)]
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A document scored against one suggestion's inquiry vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub document: DocumentRecord,
    pub similarity: f32,
}

impl RankedCandidate {
    pub fn id(&self) -> &str {
        &self.document.id
    }
}

/// The scratchpad: raw text plus its most recent analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub raw_text: String,
    pub status: RecordStatus,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub related_document_ids: Vec<String>,
    /// SHA-256 over the segmented units of `raw_text`.
    #[serde(default)]
    pub segment_fingerprint: String,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// The default note created on first access: completed and empty, with
    /// the fingerprint of empty text so an empty submission is a no-op.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_text: String::new(),
            status: RecordStatus::Completed,
            suggestions: Vec::new(),
            related_document_ids: Vec::new(),
            segment_fingerprint: crate::segment::segment_fingerprint(&crate::segment::segment("")),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_rejects_empty() {
        assert!(NarrativeGroup::new(Vec::new()).is_none());
    }

    #[test]
    fn test_group_source_text_newline_joined() {
        let evals = ["first", "second"]
            .iter()
            .map(|t| UnitEvaluation {
                text: t.to_string(),
                ..Default::default()
            })
            .collect();
        let group = NarrativeGroup::new(evals).unwrap();
        assert_eq!(group.source_text(), "first\nsecond");
    }

    #[test]
    fn test_evaluation_camel_case_wire_shape() {
        let json = serde_json::json!({
            "text": "hello",
            "narrativeStyle": "reflective",
            "criticalQuestion": "why?",
            "prev": { "reason": "", "narrativeProgression": "", "isRelevant": true }
        });
        let eval: UnitEvaluation = serde_json::from_value(json).unwrap();
        assert_eq!(eval.narrative_style, "reflective");
        assert!(eval.prev.is_relevant);
        assert!(eval.keywords.is_empty());
    }

    #[test]
    fn test_inquiry_texts_falls_back_to_title() {
        let s = Suggestion {
            title: "Sleep schedule".to_string(),
            problems: vec![],
            opportunities: vec![],
            solution_ideas: vec![],
            duration_category: String::new(),
            keywords: vec![],
            topics: vec![],
            logic: String::new(),
            inquiry_topics: vec!["  ".to_string()],
            inquiry_keywords: vec![],
            text: String::new(),
            updated_at: Utc::now(),
            related_document_ids: vec![],
        };
        assert_eq!(s.inquiry_texts(), vec!["Sleep schedule".to_string()]);
    }

    #[test]
    fn test_empty_note_is_completed() {
        let note = Note::empty("n1");
        assert_eq!(note.status, RecordStatus::Completed);
        assert!(note.suggestions.is_empty());
        assert!(note.raw_text.is_empty());
    }

    #[test]
    fn test_status_strings_match_serde() {
        assert_eq!(RecordStatus::Completed.as_str(), "completed");
        assert_eq!(
            serde_json::to_value(RecordStatus::Pending).unwrap(),
            serde_json::json!(RecordStatus::Pending.as_str())
        );
    }
}
