//! Document analyzer: derives the searchable fields of a saved document.
//!
//! One generation call reads the document content and returns its title,
//! summaries, category, topics and keywords, plus three kinds of facts
//! (`knowledge`, `readingContexts`, `insights`). Each fact is embedded
//! separately so a note can match a document through any one of them.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::analyze::TOPIC_TAXONOMY;
use crate::error::{Error, Result};
use crate::generation::{generate_json, StructuredGenerator};
use crate::models::DocumentRecord;

/// Categories a document may be filed under.
pub const DOCUMENT_CATEGORIES: &[&str] = &[
    "LLM conversations",
    "technical document",
    "news article",
    "other",
];

/// Model-derived fields of a document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub title: String,
    pub summary: String,
    pub description: String,
    pub category: String,
    pub topics: Vec<String>,
    pub keywords: Vec<String>,
    pub knowledge: Vec<String>,
    pub reading_contexts: Vec<String>,
    pub suggestions: Vec<String>,
    pub insights: Vec<String>,
}

impl DocumentAnalysis {
    /// Copy the derived fields onto `doc`, leaving id, content, status,
    /// embeddings and timestamps alone.
    pub fn apply_to(self, doc: &mut DocumentRecord) {
        doc.title = self.title;
        doc.summary = self.summary;
        doc.category = self.category;
        doc.topics = self.topics;
        doc.keywords = self.keywords;
        doc.knowledge = self.knowledge;
        doc.reading_contexts = self.reading_contexts;
        doc.description = if self.description.trim().is_empty() {
            Vec::new()
        } else {
            vec![self.description]
        };
        doc.suggestions = self.suggestions;
        doc.insights = self.insights;
    }
}

fn string_array(description: &str) -> Value {
    json!({ "type": "array", "description": description, "items": { "type": "string" } })
}

fn document_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "claims": string_array("every claim the document makes, before filtering noise"),
            "noises": string_array("site-wide boilerplate, ads and announcements to ignore"),
            "description": { "type": "string", "description": "what the document argues, in one paragraph" },
            "summary": { "type": "string", "description": "a longer explanation for a busy reader" },
            "title": { "type": "string" },
            "category": { "type": "string", "enum": DOCUMENT_CATEGORIES },
            "topics": { "type": "array", "items": { "type": "string", "enum": TOPIC_TAXONOMY } },
            "keywords": string_array("important keywords"),
            "knowledge": string_array("knowledge a reader gains from the document"),
            "readingContexts": string_array("situations in which the document would be useful"),
            "suggestions": string_array("actionable suggestions the document supports"),
            "insights": string_array("insights the document offers")
        },
        "required": ["description", "summary", "title", "category", "topics", "keywords",
                     "knowledge", "readingContexts", "suggestions", "insights"]
    })
}

fn document_prompt(content: &str) -> String {
    format!(
        "Content is a saved document. It may be incomplete and contain noise.\n\
         1. Identify the claims the document makes; its main claim carries most of its information.\n\
         2. Describe the document from its main claim.\n\
         3. Check every claim against that description and discard noise such as site-wide\n\
         boilerplate, ads and announcements.\n\
         4. From what remains, produce the fields of the schema.\n\n\
         Choose topics only from: {}\n\
         Choose the category from: {}\n\n\
         <Content>\n{}\n</Content>\n\n\
         Respond with a JSON object matching the schema.",
        TOPIC_TAXONOMY.join(", "),
        DOCUMENT_CATEGORIES.join(", "),
        content
    )
}

/// Analyze document content with one generation call.
///
/// Empty content is rejected before any call. The response must name a
/// known category and a non-empty title.
pub async fn analyze_document<G: StructuredGenerator + ?Sized>(
    generator: &G,
    content: &str,
) -> Result<DocumentAnalysis> {
    if content.trim().is_empty() {
        return Err(Error::validation("document content", "content is empty"));
    }

    let mut analysis: DocumentAnalysis =
        generate_json(generator, &document_prompt(content), &document_schema(), "document analysis").await?;

    analysis.title = analysis.title.trim().to_string();
    if analysis.title.is_empty() {
        return Err(Error::validation("document analysis", "title is empty"));
    }
    if !DOCUMENT_CATEGORIES.contains(&analysis.category.as_str()) {
        return Err(Error::validation(
            "document analysis",
            format!("unknown category {:?}", analysis.category),
        ));
    }

    debug!(
        title = %analysis.title,
        facts = analysis.knowledge.len() + analysis.reading_contexts.len() + analysis.insights.len(),
        "analyzed document"
    );
    Ok(analysis)
}

/// Texts whose embeddings represent `doc`: every non-blank knowledge entry,
/// reading context and insight, in that order. Documents with none of these
/// fall back to their description.
pub fn embedding_texts(doc: &DocumentRecord) -> Vec<String> {
    let facts: Vec<String> = doc
        .knowledge
        .iter()
        .chain(&doc.reading_contexts)
        .chain(&doc.insights)
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect();
    if !facts.is_empty() {
        return facts;
    }
    doc.description
        .iter()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect()
}
