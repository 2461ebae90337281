//! Events that can occur in a conversation

use crate::llm::{LlmError, LlmErrorKind, LlmResponse};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// User submitted a message
    UserMessage { text: String },

    /// The completion request issued against `generation` settled
    CompletionSettled {
        generation: u64,
        outcome: CompletionOutcome,
    },

    /// User cleared the history
    Reset,
}

/// What came back from the completion service
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Reply { text: String },
    Failed { kind: LlmErrorKind, message: String },
}

impl CompletionOutcome {
    pub fn reply(text: impl Into<String>) -> Self {
        CompletionOutcome::Reply { text: text.into() }
    }

    pub fn failed(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        CompletionOutcome::Failed {
            kind,
            message: message.into(),
        }
    }
}

impl From<Result<LlmResponse, LlmError>> for CompletionOutcome {
    fn from(result: Result<LlmResponse, LlmError>) -> Self {
        match result {
            Ok(response) => CompletionOutcome::Reply {
                text: response.text,
            },
            Err(e) => CompletionOutcome::Failed {
                kind: e.kind,
                message: e.message,
            },
        }
    }
}
