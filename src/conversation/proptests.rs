//! Property-based tests for the conversation core
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::*;
use crate::llm::LlmErrorKind;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Transport),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::Service),
        Just(LlmErrorKind::InvalidRequest),
    ]
}

fn arb_outcome() -> impl Strategy<Value = CompletionOutcome> {
    prop_oneof![
        "[a-zA-Z ,\"\n]{0,40}".prop_map(CompletionOutcome::reply),
        (arb_error_kind(), "[a-zA-Z ]{1,30}")
            .prop_map(|(kind, message)| CompletionOutcome::failed(kind, message)),
    ]
}

/// Events the way a session sees them: completions may carry an old
/// generation after a reset
fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z ]{0,30}".prop_map(|text| Event::UserMessage { text }),
        (0u64..4, arb_outcome()).prop_map(|(generation, outcome)| Event::CompletionSettled {
            generation,
            outcome
        }),
        Just(Event::Reset),
    ]
}

fn arb_store() -> impl Strategy<Value = ConversationStore> {
    proptest::collection::vec(arb_event(), 0..15).prop_map(|events| {
        let mut store = ConversationStore::default();
        for event in events {
            let _ = store.apply(event);
        }
        store
    })
}

fn is_well_formed(state: &ConversationState) -> bool {
    let turns = state.turns();
    let system_first = turns.first() == Some(&Turn::system(SYSTEM_PROMPT));
    let single_system = turns
        .iter()
        .filter(|t| matches!(t, Turn::System { .. }))
        .count()
        == 1;
    let unsettled = state.unsettled_user_turns();
    system_first && single_system && unsettled <= 1 && (unsettled == 1) == state.is_pending()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any sequence of events leaves a well-formed history behind
    #[test]
    fn prop_events_preserve_well_formed_history(
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let mut store = ConversationStore::default();
        for event in events {
            let before = store.state().clone();
            match store.apply(event) {
                Ok(_) => {}
                Err(_) => prop_assert_eq!(store.state(), &before, "rejected event changed state"),
            }
            prop_assert!(is_well_formed(store.state()), "Malformed: {:?}", store.state());
        }
    }

    /// Turns are only ever appended between resets
    #[test]
    fn prop_history_is_append_only(store in arb_store(), event in arb_event()) {
        let mut store = store;
        let before = store.turns().to_vec();
        let generation = store.generation();
        if store.apply(event).is_ok() && store.generation() == generation {
            prop_assert!(store.turns().len() >= before.len());
            prop_assert_eq!(&store.turns()[..before.len()], before.as_slice());
        }
    }

    /// Submissions while pending are rejected with no effect
    #[test]
    fn prop_pending_rejects_submissions(text in "[a-zA-Z ]{1,30}") {
        let mut store = ConversationStore::default();
        store.submit_user_message("first").unwrap();
        let before = store.state().clone();

        let result = store.submit_user_message(text);
        prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
        prop_assert_eq!(store.state(), &before);
    }

    /// Reset always lands on the fresh history, and twice equals once
    #[test]
    fn prop_reset_is_idempotent(store in arb_store()) {
        let mut store = store;
        store.reset();
        let once = store.turns().to_vec();
        store.reset();

        prop_assert_eq!(store.turns(), once.as_slice());
        prop_assert_eq!(store.turns(), &[Turn::system(SYSTEM_PROMPT)]);
        prop_assert!(!store.is_pending());
    }

    /// Completions tagged with an older generation never touch the history
    #[test]
    fn prop_stale_completion_is_noop(store in arb_store(), outcome in arb_outcome()) {
        let mut store = store;
        let stale = store.generation();
        store.reset();
        let _ = store.submit_user_message("after reset");
        let before = store.state().clone();

        let result = store.complete_with(stale, outcome);
        let is_stale = matches!(result, Err(TransitionError::StaleGeneration { .. }));
        prop_assert!(is_stale);
        prop_assert_eq!(store.state(), &before);
    }

    /// Export then decode reproduces every turn's role and content
    #[test]
    fn prop_export_round_trips(store in arb_store()) {
        let decoded = decode_csv(&store.export_csv()).unwrap();
        let expected: Vec<(String, String)> = store
            .turns()
            .iter()
            .map(|t| (t.role().to_string(), t.content().to_string()))
            .collect();
        prop_assert_eq!(decoded, expected);
    }

    /// An idle conversation accepts any non-blank text
    #[test]
    fn prop_idle_accepts_messages(text in "[a-zA-Z]{1,10}[a-zA-Z ]{0,20}") {
        let mut store = ConversationStore::default();
        let pending = store.submit_user_message(text.clone()).unwrap();
        prop_assert!(store.is_pending());
        prop_assert_eq!(pending.completion.request.messages.last().map(|m| m.content.as_str()), Some(text.as_str()));
    }
}
