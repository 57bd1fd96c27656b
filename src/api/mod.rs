// Client for the hosted OpenAI-compatible API (aipipe.org): one endpoint
// for embeddings, one for chat completions. Every successful call is
// appended to the daily API-call log together with its token usage.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::logbook::ApiCallLog;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// One turn of a chat prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    output: Vec<OutputItem>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    content: Vec<ContentItem>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

/// Result of one embedding call.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingOutcome {
    pub vector: Vec<f32>,
    pub total_tokens: u64,
}

/// Blocking client for the hosted embedding and completion endpoints.
#[derive(Debug, Clone)]
pub struct AipipeClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
    embedding_model: String,
    chat_model: String,
    retry_attempts: u32,
    log: ApiCallLog,
}

impl AipipeClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        if config.api.api_key.trim().is_empty() {
            warn!("API key is empty; hosted API calls will be rejected");
        }

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            agent,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            api_key: config.api.api_key.clone(),
            embedding_model: config.api.embedding_model.clone(),
            chat_model: config.api.chat_model.clone(),
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            log: ApiCallLog::new(&config.paths.api_log_dir),
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Generate an embedding for one text input.
    ///
    /// `method` names the caller in the API-call log (for example
    /// `embed_question` from the request pipeline, `embed_document` from the
    /// offline tool).
    #[inline]
    pub fn embed(&self, text: &str, method: &str) -> Result<EmbeddingOutcome> {
        debug!("Requesting embedding for text (length: {})", text.len());

        let request = EmbeddingsRequest {
            model: &self.embedding_model,
            input: text,
        };
        let body = self.post_json("embeddings", &serde_json::to_value(&request)?)?;

        let response: EmbeddingsResponse = serde_json::from_value(body.clone())
            .context("Failed to parse embeddings response")?;
        let total_tokens = response.usage.total_tokens;
        self.track(method, total_tokens, body)?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| anyhow!("Embeddings response contained no data"))?;

        debug!("Received embedding with {} dimensions", vector.len());
        Ok(EmbeddingOutcome {
            vector,
            total_tokens,
        })
    }

    /// Generate a chat completion for the given prompt turns.
    #[inline]
    pub fn complete(&self, messages: &[ChatMessage], method: &str) -> Result<String> {
        debug!("Requesting completion over {} prompt turns", messages.len());

        let request = ResponsesRequest {
            model: &self.chat_model,
            input: messages,
        };
        let body = self.post_json("responses", &serde_json::to_value(&request)?)?;

        let response: ResponsesResponse =
            serde_json::from_value(body.clone()).context("Failed to parse completion response")?;
        self.track(method, response.usage.total_tokens, body)?;

        let answer = response
            .output
            .into_iter()
            .next()
            .and_then(|item| item.content.into_iter().next())
            .map(|content| content.text)
            .ok_or_else(|| anyhow!("Completion response contained no output text"))?;

        Ok(answer)
    }

    fn track(&self, method: &str, total_tokens: u64, response_data: Value) -> Result<()> {
        self.log
            .record(method, json!({ "total_tokens": total_tokens }), response_data)
            .with_context(|| format!("Failed to log API call: {}", method))
    }

    fn post_json(&self, endpoint: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let request_json =
            serde_json::to_string(payload).context("Failed to serialize request body")?;
        let bearer = format!("Bearer {}", self.api_key);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(&url)
                    .header("Content-Type", "application/json")
                    .header("Authorization", &bearer)
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .with_context(|| format!("Request to {} failed", url))?;

        serde_json::from_str(&response_text).context("Response body is not valid JSON")
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}
