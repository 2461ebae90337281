//! Effects produced by state transitions

use super::state::Turn;
use crate::llm::LlmRequest;

/// Effects to be executed after state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Issue the completion request, tagged with the generation it belongs to
    RequestCompletion {
        generation: u64,
        request: LlmRequest,
    },

    /// Drop the in-flight completion, if any
    AbortCompletion,

    /// A turn was appended
    NotifyTurn { turn: Turn },

    /// Pending flag or generation changed
    NotifyStateChange { pending: bool, generation: u64 },

    /// History was replaced by a fresh one
    NotifyReset { generation: u64 },
}

impl Effect {
    pub fn notify_turn(turn: Turn) -> Self {
        Effect::NotifyTurn { turn }
    }

    pub fn notify_state_change(pending: bool, generation: u64) -> Self {
        Effect::NotifyStateChange {
            pending,
            generation,
        }
    }
}
