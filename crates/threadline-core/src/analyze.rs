//! Unit analyzer: one batched generation call for all units.
//!
//! The generator receives the ordered unit list together with a fixed topic
//! taxonomy and returns one evaluation per unit. Order is load-bearing
//! because grouping reads each evaluation's link to its predecessor, so a
//! response with the wrong number of evaluations is rejected.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::generation::{generate_json, StructuredGenerator};
use crate::models::{TextUnit, UnitEvaluation};

/// Topic taxonomy offered to the model for `topics`.
pub const TOPIC_TAXONOMY: &[&str] = &[
    "Work & Career",
    "Productivity",
    "Health & Fitness",
    "Mental Health",
    "Relationships",
    "Family",
    "Finance",
    "Learning & Education",
    "Technology",
    "Creativity",
    "Home & Living",
    "Travel",
    "Hobbies",
    "Spirituality",
    "Society & Politics",
    "Science",
    "Business & Entrepreneurship",
    "Personal Growth",
];

#[derive(Debug, Deserialize)]
struct EvaluationResponse {
    evaluations: Vec<UnitEvaluation>,
}

fn evaluation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "evaluations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "text": { "type": "string" },
                        "keywords": { "type": "array", "items": { "type": "string" } },
                        "topics": { "type": "array", "items": { "type": "string", "enum": TOPIC_TAXONOMY } },
                        "narrativeStyle": { "type": "string" },
                        "insights": { "type": "array", "items": { "type": "string" } },
                        "logic": { "type": "string" },
                        "emotion": { "type": "string" },
                        "needs": { "type": "array", "items": { "type": "string" } },
                        "criticalQuestion": { "type": "string" },
                        "prev": {
                            "type": "object",
                            "properties": {
                                "reason": { "type": "string" },
                                "narrativeProgression": { "type": "string" },
                                "isRelevant": { "type": "boolean" }
                            },
                            "required": ["reason", "narrativeProgression", "isRelevant"]
                        }
                    },
                    "required": ["text", "keywords", "topics", "narrativeStyle", "insights",
                                 "logic", "emotion", "needs", "criticalQuestion", "prev"]
                }
            }
        },
        "required": ["evaluations"]
    })
}

fn evaluation_prompt(units: &[TextUnit]) -> String {
    let mut prompt = String::from(
        "You are reading someone's stream-of-consciousness notes, split into numbered units.\n\
         Analyze every unit in order and return exactly one evaluation per unit, in the same order.\n\
         For each unit give keywords, topics, the narrative style, insights, the underlying logic,\n\
         the dominant emotion, the needs it expresses, and the single most critical question it raises.\n\
         In `prev`, judge whether the unit continues the thread of the unit immediately before it\n\
         (`isRelevant`), why, and how the narrative progresses. For the first unit set `isRelevant` to false.\n\n",
    );
    prompt.push_str("Choose topics only from: ");
    prompt.push_str(&TOPIC_TAXONOMY.join(", "));
    prompt.push_str("\n\nUnits:\n");
    for (i, unit) in units.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", i + 1, unit.text));
    }
    prompt.push_str("\nRespond with a JSON object matching the schema.");
    prompt
}

/// Evaluate all units with one generation call, preserving input order.
///
/// The returned evaluations carry the input unit texts verbatim, so later
/// stages never depend on the model echoing the text back faithfully.
pub async fn evaluate_units<G: StructuredGenerator + ?Sized>(
    generator: &G,
    units: &[TextUnit],
) -> Result<Vec<UnitEvaluation>> {
    if units.is_empty() {
        return Ok(Vec::new());
    }

    let response: EvaluationResponse = generate_json(
        generator,
        &evaluation_prompt(units),
        &evaluation_schema(),
        "unit evaluations",
    )
    .await?;

    if response.evaluations.len() != units.len() {
        return Err(Error::validation(
            "unit evaluations",
            format!(
                "expected {} evaluations, got {}",
                units.len(),
                response.evaluations.len()
            ),
        ));
    }

    let evaluations: Vec<UnitEvaluation> = response
        .evaluations
        .into_iter()
        .zip(units)
        .map(|(mut evaluation, unit)| {
            evaluation.text = unit.text.clone();
            evaluation
        })
        .collect();

    debug!(units = units.len(), model = generator.model_name(), "evaluated units");
    Ok(evaluations)
}
