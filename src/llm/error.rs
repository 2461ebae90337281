//! LLM error types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// LLM error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Transport, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Auth, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::RateLimit, message)
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Service, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::InvalidRequest, message)
    }
}

/// Error classification, shared with the conversation history so error
/// markers remember what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmErrorKind {
    /// Connection failures, timeouts, truncated bodies
    Transport,
    /// Missing credential or 401/403
    Auth,
    /// Throttled (429)
    RateLimit,
    /// Any other non-success outcome from the service
    Service,
    /// Rejected locally, never sent
    InvalidRequest,
}

impl LlmErrorKind {
    /// Whether a caller could reasonably resubmit the same request
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transport | Self::RateLimit)
    }

    /// Auth failures end the session's usefulness until the operator fixes the key
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Auth)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Service => "service",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
