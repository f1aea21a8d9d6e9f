//! Relevance confirmer: asks the model which ranked candidates are useful.
//!
//! Only a projection of each candidate is sent (id and descriptive fields).
//! Embeddings and similarity scores stay local; they were only used to
//! pre-filter the candidates.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::generation::{generate_json, StructuredGenerator};
use crate::models::RankedCandidate;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateProjection<'a> {
    id: &'a str,
    topics: &'a [String],
    knowledge: &'a [String],
    reading_contexts: &'a [String],
    description: &'a [String],
    suggestions: &'a [String],
}

impl<'a> From<&'a RankedCandidate> for CandidateProjection<'a> {
    fn from(c: &'a RankedCandidate) -> Self {
        let d = &c.document;
        Self {
            id: &d.id,
            topics: &d.topics,
            knowledge: &d.knowledge,
            reading_contexts: &d.reading_contexts,
            description: &d.description,
            suggestions: &d.suggestions,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfirmationResponse {
    results: Vec<Verdict>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Verdict {
    id: String,
    is_useful: bool,
}

fn confirmation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "isUseful": { "type": "boolean" }
                    },
                    "required": ["id", "isUseful"]
                }
            }
        },
        "required": ["results"]
    })
}

fn confirmation_prompt(source_text: &str, candidates: &[RankedCandidate]) -> Result<String> {
    let projections: Vec<CandidateProjection<'_>> = candidates.iter().map(Into::into).collect();
    let documents = serde_json::to_string_pretty(&projections)
        .map_err(|e| Error::validation("relevance confirmation", e.to_string()))?;
    Ok(format!(
        "Someone wrote the following notes:\n\n{}\n\n\
         Below are documents they saved earlier. For every document id, decide whether reading\n\
         it would genuinely help with what the notes are about (`isUseful`). Be strict: topical\n\
         overlap alone is not enough.\n\nDocuments:\n{}\n\n\
         Respond with a JSON object matching the schema, one result per document id.",
        source_text, documents
    ))
}

/// Return the ids of candidates the model marks useful, in rank order.
///
/// Ids missing from the response count as not useful; ids that were not
/// offered are ignored.
pub async fn confirm<G: StructuredGenerator + ?Sized>(
    generator: &G,
    source_text: &str,
    candidates: &[RankedCandidate],
) -> Result<Vec<String>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let response: ConfirmationResponse = generate_json(
        generator,
        &confirmation_prompt(source_text, candidates)?,
        &confirmation_schema(),
        "relevance confirmation",
    )
    .await?;

    let useful: HashSet<&str> = response
        .results
        .iter()
        .filter(|v| v.is_useful)
        .map(|v| v.id.as_str())
        .collect();

    let mut seen = HashSet::new();
    let confirmed: Vec<String> = candidates
        .iter()
        .map(|c| c.id())
        .filter(|id| useful.contains(id) && seen.insert(*id))
        .map(str::to_string)
        .collect();

    debug!(
        offered = candidates.len(),
        confirmed = confirmed.len(),
        "confirmed related documents"
    );
    Ok(confirmed)
}
