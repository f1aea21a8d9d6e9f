//! JSON POST with retry and exponential backoff, shared by the embedding
//! and generation providers.
//!
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

/// One request target: endpoint, optional bearer token, and a label used in
/// error messages and logs (e.g. `"OpenAI"`).
pub struct JsonEndpoint<'a> {
    pub label: &'a str,
    pub url: String,
    pub bearer: Option<&'a str>,
}

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Whether a response status is worth retrying.
pub fn is_retryable(status: reqwest::StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// POST `body` and return the decoded JSON response.
///
/// Errors are rendered as strings so each provider can wrap them in its
/// own error variant.
pub async fn post_json(
    client: &reqwest::Client,
    endpoint: &JsonEndpoint<'_>,
    body: &Value,
    max_retries: u32,
) -> Result<Value, String> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            warn!(
                provider = endpoint.label,
                attempt,
                delay_secs = delay.as_secs(),
                error = last_err.as_deref().unwrap_or(""),
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = endpoint.bearer {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<Value>()
                        .await
                        .map_err(|e| format!("{} response decode failed: {}", endpoint.label, e));
                }

                let body_text = response.text().await.unwrap_or_default();
                let message = format!("{} API error {}: {}", endpoint.label, status, body_text);
                if is_retryable(status) {
                    last_err = Some(message);
                    continue;
                }
                return Err(message);
            }
            Err(e) => {
                last_err = Some(format!(
                    "{} connection error ({}): {}",
                    endpoint.label, endpoint.url, e
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| format!("{} request failed after retries", endpoint.label)))
}
