//! Conversation core
//!
//! Implements the Elm Architecture pattern with pure state transitions. The
//! store wraps the transition function for callers that want to apply
//! events and get effects back.

mod effect;
pub mod event;
mod export;
pub mod settings;
pub mod state;
mod store;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{CompletionOutcome, Event};
pub use settings::{GenerationSettings, SettingsBounds, SettingsError};
pub use state::Turn;
pub use store::{ConversationSnapshot, ConversationStore};
pub use transition::TransitionError;

#[allow(unused_imports)] // Public API re-exports
pub use export::{decode_csv, encode_csv, CsvError, CSV_CONTENT_TYPE, HISTORY_FILENAME};
#[allow(unused_imports)] // Public API re-exports
pub use state::{ConversationState, SYSTEM_PROMPT};
#[allow(unused_imports)] // Public API re-exports
pub use store::{PendingCompletion, Submission};
#[allow(unused_imports)] // Public API re-exports
pub use transition::{transition, TransitionResult};
