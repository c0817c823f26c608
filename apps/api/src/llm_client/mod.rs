//! LLM client, the single point of entry for all Claude API calls.
//!
//! Summary generation and preview both go through this module; nothing else
//! talks to the Anthropic API.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Model recorded as `ai_model` on every generated summary.
pub const MODEL: &str = "claude-sonnet-4-5";
/// Recaps with a full markdown document need a generous output budget.
const MAX_TOKENS: u32 = 8192;
/// Long transcripts make generation slow; keep the request alive well past a minute.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<LlmError> },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// How many times a request is sent and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Wait before `attempt` (0-based): none for the first, then doubling.
    fn delay_before(&self, attempt: u32) -> Duration {
        match attempt {
            0 => Duration::ZERO,
            n => self.base_delay.saturating_mul(1 << (n - 1).min(16)),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [UserMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

impl LlmResponse {
    /// Text of the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Outcome of one request.
enum Attempt {
    Done(LlmResponse),
    Retryable(LlmError),
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            retry: RetryPolicy::default(),
        }
    }

    /// Sends a single-turn request, retrying rate limits, overloads and transport errors.
    async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request = MessagesRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: [UserMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut last = None;
        for attempt in 0..self.retry.max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                warn!(
                    "Retrying summary generation in {}ms (attempt {})",
                    delay.as_millis(),
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&request).await? {
                Attempt::Done(response) => return Ok(response),
                Attempt::Retryable(e) => {
                    warn!("LLM request failed: {e}");
                    last = Some(e);
                }
            }
        }

        Err(LlmError::Exhausted {
            attempts: self.retry.max_attempts,
            last: Box::new(last.unwrap_or(LlmError::EmptyContent)),
        })
    }

    async fn send_once(&self, request: &MessagesRequest<'_>) -> Result<Attempt, LlmError> {
        let response = match self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return Ok(Attempt::Retryable(LlmError::Http(e))),
        };

        let status = response.status();
        if status.is_success() {
            let body: LlmResponse = response.json().await?;
            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                body.usage.input_tokens, body.usage.output_tokens
            );
            return Ok(Attempt::Done(body));
        }

        let error = LlmError::Api {
            status: status.as_u16(),
            message: api_error_message(&response.text().await.unwrap_or_default()),
        };
        if is_retryable(status) {
            Ok(Attempt::Retryable(error))
        } else {
            Err(error)
        }
    }

    /// Calls the LLM and deserializes the text response as JSON, returning token
    /// usage alongside. The prompt must instruct the model to return valid JSON.
    pub async fn call_json_with_usage<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<(T, Usage), LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let value = serde_json::from_str(strip_json_fences(text))?;
        Ok((value, response.usage))
    }
}

/// 429 (rate limited), 529 (overloaded) and other 5xx are worth another try.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Pulls `error.message` out of an API error body, or returns the body as-is.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

/// Strips a ```json / ``` fence if the model wrapped its JSON in one.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
    else {
        return text;
    };
    let inner = inner.trim_start();
    inner.strip_suffix("```").map_or(inner, str::trim)
}
