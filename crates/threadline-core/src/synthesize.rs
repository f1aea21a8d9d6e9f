//! Suggestion synthesizer: one generation call per narrative group.

use chrono::Utc;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::generation::{generate_json, StructuredGenerator};
use crate::models::{NarrativeGroup, SolutionIdea, Suggestion};

/// Fields of a suggestion supplied by the model. `text` and `updated_at`
/// are filled in locally.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestionResponse {
    title: String,
    #[serde(default)]
    problems: Vec<String>,
    #[serde(default)]
    opportunities: Vec<String>,
    #[serde(default)]
    solution_ideas: Vec<SolutionIdea>,
    #[serde(default)]
    duration_category: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    logic: String,
    #[serde(default)]
    inquiry_topics: Vec<String>,
    #[serde(default)]
    inquiry_keywords: Vec<String>,
}

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

fn suggestion_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": { "type": "string" },
            "problems": string_array(),
            "opportunities": string_array(),
            "solutionIdeas": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "approach": { "type": "string" },
                        "explanation": { "type": "string" },
                        "novelty": string_array()
                    },
                    "required": ["approach", "explanation", "novelty"]
                }
            },
            "durationCategory": { "type": "string", "enum": ["short-term", "mid-term", "long-term"] },
            "keywords": string_array(),
            "topics": string_array(),
            "logic": { "type": "string" },
            "inquiryTopics": string_array(),
            "inquiryKeywords": string_array()
        },
        "required": ["title", "problems", "opportunities", "solutionIdeas", "durationCategory",
                     "keywords", "topics", "logic", "inquiryTopics", "inquiryKeywords"]
    })
}

fn suggestion_prompt(group: &NarrativeGroup) -> String {
    let mut prompt = String::from(
        "The following notes form one continuous line of thought. Synthesize a single suggestion:\n\
         a short title, the problems being wrestled with, the opportunities they open, concrete\n\
         solution ideas (approach, explanation, what is novel about it), whether acting on it is\n\
         short-term, mid-term or long-term, keywords, topics and the reasoning behind the\n\
         suggestion. Finally list inquiry topics and inquiry keywords: short search phrases for\n\
         finding previously saved reading material that would help.\n\nNotes:\n",
    );
    for evaluation in group.evaluations() {
        prompt.push_str("- ");
        prompt.push_str(&evaluation.text);
        if !evaluation.critical_question.is_empty() {
            prompt.push_str(&format!(" (open question: {})", evaluation.critical_question));
        }
        prompt.push('\n');
    }
    prompt.push_str("\nRespond with a JSON object matching the schema.");
    prompt
}

/// Synthesize one suggestion for a group.
pub async fn synthesize<G: StructuredGenerator + ?Sized>(
    generator: &G,
    group: &NarrativeGroup,
) -> Result<Suggestion> {
    let response: SuggestionResponse =
        generate_json(generator, &suggestion_prompt(group), &suggestion_schema(), "suggestion").await?;

    if response.title.trim().is_empty() {
        return Err(Error::validation("suggestion", "title is empty"));
    }

    Ok(Suggestion {
        title: response.title.trim().to_string(),
        problems: response.problems,
        opportunities: response.opportunities,
        solution_ideas: response.solution_ideas,
        duration_category: response.duration_category,
        keywords: response.keywords,
        topics: response.topics,
        logic: response.logic,
        inquiry_topics: response.inquiry_topics,
        inquiry_keywords: response.inquiry_keywords,
        text: group.source_text(),
        updated_at: Utc::now(),
        related_document_ids: Vec::new(),
    })
}

/// Synthesize all groups concurrently.
///
/// Fail-fast: the first failing group fails the whole phase and no partial
/// results are returned. Output order follows group order.
pub async fn synthesize_all<G: StructuredGenerator + ?Sized>(
    generator: &G,
    groups: &[NarrativeGroup],
) -> Result<Vec<Suggestion>> {
    let suggestions = try_join_all(groups.iter().map(|g| synthesize(generator, g))).await?;
    debug!(groups = groups.len(), "synthesized suggestions");
    Ok(suggestions)
}
