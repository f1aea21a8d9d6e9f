//! Structured-generation providers.
//!
//! Concrete implementations of
//! [`threadline_core::generation::StructuredGenerator`]:
//! - **[`DisabledGenerator`]**: always errors.
//! - **[`OpenAIGenerator`]**: chat completions with `response_format: json_object`.
//! - **[`OllamaGenerator`]**: `/api/generate` with the schema passed as `format`.
//!
//! Providers return the raw text of the model's answer; extracting and
//! validating the JSON object happens in the core crate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use threadline_core::generation::StructuredGenerator;
use threadline_core::Error;

use crate::config::GenerationConfig;
use crate::http::{post_json, JsonEndpoint};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const SYSTEM_PROMPT: &str =
    "You are a careful analyst. Respond with a single JSON object and nothing else.";

/// Create the generator selected by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn StructuredGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// Prompt text with the expected shape appended.
fn prompt_with_schema(prompt: &str, schema: &Value) -> String {
    format!(
        "{}\n\nRespond with JSON matching this schema:\n{}",
        prompt,
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
    )
}

pub struct DisabledGenerator;

#[async_trait]
impl StructuredGenerator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate_structured(&self, _prompt: &str, _schema: &Value) -> threadline_core::Result<String> {
        Err(Error::Generation("generation provider is disabled".into()))
    }
}

/// OpenAI chat completions. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl StructuredGenerator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> threadline_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt_with_schema(prompt, schema) }
            ]
        });
        let endpoint = JsonEndpoint {
            label: "OpenAI",
            url: OPENAI_CHAT_URL.to_string(),
            bearer: Some(&self.api_key),
        };
        let json = post_json(&self.client, &endpoint, &body, self.max_retries)
            .await
            .map_err(Error::Generation)?;
        parse_openai_content(&json)
    }
}

fn parse_openai_content(json: &Value) -> threadline_core::Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Generation("invalid OpenAI response: missing message content".into()))
}

/// Ollama `/api/generate` in non-streaming mode.
pub struct OllamaGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            model,
            url,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl StructuredGenerator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> threadline_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "system": SYSTEM_PROMPT,
            "prompt": prompt_with_schema(prompt, schema),
            "format": schema,
            "stream": false
        });
        let endpoint = JsonEndpoint {
            label: "Ollama",
            url: format!("{}/api/generate", self.url.trim_end_matches('/')),
            bearer: None,
        };
        let json = post_json(&self.client, &endpoint, &body, self.max_retries)
            .await
            .map_err(Error::Generation)?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Generation("invalid Ollama response: missing response".into()))
    }
}
