//! Conversation state types

use crate::llm::{LlmErrorKind, LlmMessage, MessageRole};
use serde::Serialize;

/// Instruction turn every conversation starts with
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

// ============================================================================
// Turns
// ============================================================================

/// One entry in the conversation history. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: String,
    },
    /// Terminal marker standing in for the assistant turn of a failed
    /// request. Rendered and exported, never sent as prompt context.
    Error {
        content: String,
        error_kind: LlmErrorKind,
    },
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Turn::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Turn::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Turn::Assistant {
            content: content.into(),
        }
    }

    pub fn error(error_kind: LlmErrorKind, content: impl Into<String>) -> Self {
        Turn::Error {
            content: content.into(),
            error_kind,
        }
    }

    pub fn role(&self) -> &'static str {
        match self {
            Turn::System { .. } => "system",
            Turn::User { .. } => "user",
            Turn::Assistant { .. } => "assistant",
            Turn::Error { .. } => "error",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Turn::System { content }
            | Turn::User { content }
            | Turn::Assistant { content }
            | Turn::Error { content, .. } => content,
        }
    }

    /// Whether this turn closes out a user turn
    pub fn is_settlement(&self) -> bool {
        matches!(self, Turn::Assistant { .. } | Turn::Error { .. })
    }

    /// Prompt form of this turn; error markers have none
    pub fn to_prompt_message(&self) -> Option<LlmMessage> {
        let role = match self {
            Turn::System { .. } => MessageRole::System,
            Turn::User { .. } => MessageRole::User,
            Turn::Assistant { .. } => MessageRole::Assistant,
            Turn::Error { .. } => return None,
        };
        Some(LlmMessage::new(role, self.content()))
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// The whole of a session's mutable state.
///
/// Fields are private: the only way to change them is the transition
/// function, which keeps the system turn at index 0 and at most one
/// request outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    turns: Vec<Turn>,
    pending: bool,
    generation: u64,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::fresh(0)
    }
}

impl ConversationState {
    /// Initial state for the given generation: the system turn and nothing else
    pub(super) fn fresh(generation: u64) -> Self {
        Self {
            turns: vec![Turn::system(SYSTEM_PROMPT)],
            pending: false,
            generation,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Copy of this state with `turn` appended and the pending flag set
    pub(super) fn with_turn(&self, turn: Turn, pending: bool) -> Self {
        let mut turns = Vec::with_capacity(self.turns.len() + 1);
        turns.extend_from_slice(&self.turns);
        turns.push(turn);
        Self {
            turns,
            pending,
            generation: self.generation,
        }
    }

    /// Prompt context for the next completion request
    pub fn prompt_messages(&self) -> Vec<LlmMessage> {
        self.turns.iter().filter_map(Turn::to_prompt_message).collect()
    }

    /// User turns not yet followed by an assistant turn or error marker
    pub fn unsettled_user_turns(&self) -> usize {
        let users = self.turns.iter().filter(|t| matches!(t, Turn::User { .. })).count();
        let settled = self.turns.iter().filter(|t| t.is_settlement()).count();
        users.saturating_sub(settled)
    }
}
