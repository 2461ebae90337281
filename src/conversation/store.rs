//! Conversation store: the one owner of a session's history
//!
//! Every mutation runs through [`transition`], so the ordering and
//! re-entrancy rules live in one place. The store applies the new state and
//! hands the effects back to its caller to execute.

use super::event::CompletionOutcome;
use super::export::encode_csv;
use super::settings::GenerationSettings;
use super::state::{ConversationState, Turn};
use super::transition::{transition, TransitionError};
use super::{Effect, Event};
use crate::llm::LlmRequest;
use serde::Serialize;

/// A completion the caller must now start
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCompletion {
    pub generation: u64,
    pub request: LlmRequest,
}

/// Accepted submission: the history including the new user turn, and the
/// request to issue for it
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub turns: Vec<Turn>,
    pub completion: PendingCompletion,
}

/// Serializable view of a conversation for rendering
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub turns: Vec<Turn>,
    pub pending: bool,
    pub generation: u64,
    pub settings: GenerationSettings,
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    state: ConversationState,
    settings: GenerationSettings,
}

impl ConversationStore {
    pub fn new(settings: GenerationSettings) -> Self {
        Self {
            state: ConversationState::default(),
            settings,
        }
    }

    #[allow(dead_code)] // API completeness
    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    #[allow(dead_code)] // API completeness
    pub fn turns(&self) -> &[Turn] {
        self.state.turns()
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    pub fn generation(&self) -> u64 {
        self.state.generation()
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    /// Takes effect from the next submission; an in-flight request keeps the
    /// settings it was built with.
    pub fn set_settings(&mut self, settings: GenerationSettings) {
        self.settings = settings;
    }

    /// Feed one event through the transition function and commit the result
    pub fn apply(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let result = transition(&self.state, &self.settings, event)?;
        self.state = result.new_state;
        debug_assert!(self.state.unsettled_user_turns() <= 1);
        Ok(result.effects)
    }

    /// Append a user turn and mark the conversation pending.
    ///
    /// The session runtime drives the store through [`Self::apply`] so it can
    /// broadcast every effect; this is the direct form.
    ///
    /// Rejected without any change when the text is blank or a reply is
    /// still outstanding.
    #[allow(dead_code)] // API completeness
    pub fn submit_user_message(
        &mut self,
        text: impl Into<String>,
    ) -> Result<Submission, TransitionError> {
        let effects = self.apply(Event::UserMessage { text: text.into() })?;
        let completion = effects
            .into_iter()
            .find_map(|effect| match effect {
                Effect::RequestCompletion {
                    generation,
                    request,
                } => Some(PendingCompletion {
                    generation,
                    request,
                }),
                _ => None,
            })
            .ok_or(TransitionError::NotPending)?;
        Ok(Submission {
            turns: self.state.turns().to_vec(),
            completion,
        })
    }

    /// Record the outcome of the request issued against `generation`
    #[allow(dead_code)] // API completeness
    pub fn complete_with(
        &mut self,
        generation: u64,
        outcome: CompletionOutcome,
    ) -> Result<&Turn, TransitionError> {
        self.apply(Event::CompletionSettled {
            generation,
            outcome,
        })?;
        self.state
            .turns()
            .last()
            .ok_or(TransitionError::NotPending)
    }

    /// Start over with a fresh history; any in-flight result becomes stale
    pub fn reset(&mut self) -> Vec<Effect> {
        // Reset is accepted from every state
        self.apply(Event::Reset).unwrap_or_default()
    }

    /// `(role, content)` pairs in turn order, system turn included
    pub fn export_history(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.state.turns().iter().map(|t| (t.role(), t.content()))
    }

    pub fn export_csv(&self) -> String {
        encode_csv(self.export_history())
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            turns: self.state.turns().to_vec(),
            pending: self.state.is_pending(),
            generation: self.state.generation(),
            settings: self.settings,
        }
    }
}
