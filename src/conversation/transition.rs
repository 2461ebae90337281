//! Pure state transition function
//!
//! Given the same state, settings and event this always produces the same
//! new state and effects, with no I/O. The runtime owns the I/O.

use super::event::CompletionOutcome;
use super::settings::GenerationSettings;
use super::state::{ConversationState, Turn};
use super::{Effect, Event};
use crate::llm::LlmRequest;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition. Each leaves the state untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Still waiting for the previous reply")]
    Busy,
    #[error("No completion request is outstanding")]
    NotPending,
    #[error("Completion for generation {received} arrived after reset (now {current})")]
    StaleGeneration { current: u64, received: u64 },
}

/// Pure transition function
pub fn transition(
    state: &ConversationState,
    settings: &GenerationSettings,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // User Message Handling
        // ============================================================
        Event::UserMessage { .. } if state.is_pending() => Err(TransitionError::Busy),

        Event::UserMessage { text } if text.trim().is_empty() => {
            Err(TransitionError::EmptyMessage)
        }

        Event::UserMessage { text } => {
            let turn = Turn::user(text);
            let new_state = state.with_turn(turn.clone(), true);
            let request = build_request(&new_state, settings);
            let generation = new_state.generation();

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::notify_turn(turn))
                .with_effect(Effect::notify_state_change(true, generation))
                .with_effect(Effect::RequestCompletion {
                    generation,
                    request,
                }))
        }

        // ============================================================
        // Completion Handling
        // ============================================================
        Event::CompletionSettled { generation, .. } if generation != state.generation() => {
            Err(TransitionError::StaleGeneration {
                current: state.generation(),
                received: generation,
            })
        }

        Event::CompletionSettled { .. } if !state.is_pending() => {
            Err(TransitionError::NotPending)
        }

        Event::CompletionSettled { outcome, .. } => {
            let turn = match outcome {
                CompletionOutcome::Reply { text } => Turn::assistant(text),
                CompletionOutcome::Failed { kind, message } => Turn::error(kind, message),
            };
            let new_state = state.with_turn(turn.clone(), false);
            let generation = new_state.generation();

            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::notify_turn(turn))
                .with_effect(Effect::notify_state_change(false, generation)))
        }

        // ============================================================
        // Reset
        // ============================================================
        Event::Reset => {
            let generation = state.generation() + 1;
            let mut result = TransitionResult::new(ConversationState::fresh(generation));
            if state.is_pending() {
                result = result.with_effect(Effect::AbortCompletion);
            }
            Ok(result.with_effect(Effect::NotifyReset { generation }))
        }
    }
}

/// Build the completion request for the state just entered
fn build_request(state: &ConversationState, settings: &GenerationSettings) -> LlmRequest {
    LlmRequest {
        messages: state.prompt_messages(),
        max_output_tokens: settings.max_output_tokens,
        temperature: settings.temperature,
    }
}
