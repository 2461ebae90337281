//! Common types for LLM interactions

use super::LlmError;
use serde::{Deserialize, Serialize};

/// LLM request, rebuilt from the conversation for every call
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl LlmRequest {
    /// Check the request before it leaves the process.
    ///
    /// The prompt must open with the system instruction; an empty or
    /// system-less history means the caller built the request wrong.
    pub fn validate(&self) -> Result<(), LlmError> {
        match self.messages.first() {
            None => return Err(LlmError::invalid_request("Request has no messages")),
            Some(first) if first.role != MessageRole::System => {
                return Err(LlmError::invalid_request(
                    "First message must be the system instruction",
                ));
            }
            Some(_) => {}
        }

        if self.max_output_tokens == 0 {
            return Err(LlmError::invalid_request("max_output_tokens must be positive"));
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(LlmError::invalid_request(format!(
                "temperature {} outside [0, 1]",
                self.temperature
            )));
        }

        Ok(())
    }
}

/// Message in the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
}

impl LlmMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// LLM response: the top-ranked candidate only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    pub text: String,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: Usage::default(),
        }
    }
}

/// Usage statistics, logged but not accounted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
