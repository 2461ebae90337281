//! `OpenAI`-compatible chat completions provider

use super::types::{LlmMessage, LlmRequest, LlmResponse, Usage};
use super::{LlmError, LlmService};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// `OpenAI`-compatible service implementation
pub struct OpenAIService {
    client: Client,
    api_key: Option<String>,
    model: String,
    endpoint: String,
}

impl OpenAIService {
    /// Build a client for `{api_base}/chat/completions`.
    ///
    /// A missing key is accepted here and reported as an auth error on the
    /// first call, so the server can still start and serve the UI.
    pub fn new(
        api_key: Option<String>,
        model: impl Into<String>,
        api_base: &str,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(translate_message).collect(),
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            stream: false,
        }
    }
}

fn translate_message(msg: &LlmMessage) -> OpenAIMessage {
    OpenAIMessage {
        role: msg.role.as_str().to_string(),
        content: Some(msg.content.clone()),
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        request.validate()?;

        let Some(api_key) = self.api_key.as_deref() else {
            return Err(LlmError::auth(
                "No API key configured (set OPENAI_API_KEY)",
            ));
        };

        let openai_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::transport(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::transport(format!("Connection failed: {e}"))
                } else if e.is_request() {
                    LlmError::transport(format!("Request failed: {e}"))
                } else {
                    LlmError::service(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &body, retry_after));
        }

        parse_response(&body)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Map a non-success status onto the error taxonomy
pub(crate) fn classify_status(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> LlmError {
    let message = serde_json::from_str::<OpenAIErrorResponse>(body)
        .map_or_else(|_| body.trim().to_string(), |r| r.error.message);

    match status.as_u16() {
        401 | 403 => LlmError::auth(format!("Authentication failed: {message}")),
        429 => {
            let err = LlmError::rate_limit(format!("Rate limit exceeded: {message}"));
            match retry_after {
                Some(delay) => err.with_retry_after(delay),
                None => err,
            }
        }
        _ => LlmError::service(format!("HTTP {status}: {message}")),
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Take the first choice out of a chat completions body
pub(crate) fn parse_response(body: &str) -> Result<LlmResponse, LlmError> {
    let resp: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::service(format!("Failed to parse response: {e}")))?;

    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::service("No choices in response"))?;

    if choice.finish_reason.as_deref() == Some("length") {
        tracing::debug!("Completion truncated at max_tokens");
    }

    let text = choice
        .message
        .content
        .ok_or_else(|| LlmError::service("Response choice has no text content"))?;

    let usage = resp.usage.map_or_else(Usage::default, |u| Usage {
        input_tokens: u64::from(u.prompt_tokens),
        output_tokens: u64::from(u.completion_tokens),
    });

    Ok(LlmResponse { text, usage })
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}
