//! Structured-generation boundary.
//!
//! The language model is an opaque function taking a prompt and a
//! JSON-schema-like shape and returning raw text that should contain one
//! JSON object, possibly wrapped in prose or a markdown fence. Everything
//! the pipeline consumes from it passes through [`generate_json`], which
//! extracts the first valid object and deserializes it into a typed shape,
//! so loosely typed output is rejected at this one boundary.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// Opaque structured-generation backend.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;

    /// Generate raw text expected to contain a JSON object conforming to `schema`.
    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<String>;
}

/// Extract the first complete JSON object embedded in `raw`.
///
/// Scans each `{` in order and attempts to parse one JSON value starting
/// there, so leading prose, markdown fences and trailing commentary are
/// tolerated.
///
/// ```rust
/// use threadline_core::generation::extract_json_object;
///
/// let raw = "Sure! Here you go:\n```json\n{\"ok\": true}\n```\nAnything else?";
/// let value = extract_json_object(raw).unwrap();
/// assert_eq!(value["ok"], true);
/// ```
pub fn extract_json_object(raw: &str) -> Option<Value> {
    for (start, _) in raw.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        if let Some(Ok(value @ Value::Object(_))) = stream.next() {
            return Some(value);
        }
    }
    None
}

/// Parse raw model output into `T`.
///
/// Returns [`Error::Parse`] when no JSON object is present and
/// [`Error::Validation`] when the object does not match `T`.
pub fn parse_structured<T: DeserializeOwned>(raw: &str, context: &str) -> Result<T> {
    let value = extract_json_object(raw).ok_or_else(|| {
        let preview: String = raw.chars().take(120).collect();
        Error::Parse(format!("{}: no JSON object in output: {:?}", context, preview))
    })?;
    serde_json::from_value(value).map_err(|e| Error::validation(context, e.to_string()))
}

/// Call the generator and parse its output into `T`.
pub async fn generate_json<G, T>(generator: &G, prompt: &str, schema: &Value, context: &str) -> Result<T>
where
    G: StructuredGenerator + ?Sized,
    T: DeserializeOwned,
{
    let raw = generator.generate_structured(prompt, schema).await?;
    parse_structured(&raw, context)
}
