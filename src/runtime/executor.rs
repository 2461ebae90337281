//! Session runtime executor

use super::{SessionCommand, SseEvent};

use crate::conversation::{
    CompletionOutcome, ConversationStore, Effect, Event, GenerationSettings, TransitionError,
};
use crate::llm::{LlmError, LlmRequest, LlmService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Owns one session's conversation and applies every change to it in order
pub struct SessionRuntime<L>
where
    L: LlmService + 'static,
{
    session_id: String,
    store: ConversationStore,
    llm: Arc<L>,
    request_timeout: Duration,
    /// Stop after this long with no commands, no subscribers and nothing in flight
    idle_timeout: Duration,
    command_rx: mpsc::Receiver<SessionCommand>,
    /// Completion tasks report back here
    completion_tx: mpsc::Sender<Event>,
    completion_rx: mpsc::Receiver<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    /// Token to cancel the in-flight completion request
    cancel_token: Option<CancellationToken>,
}

impl<L> SessionRuntime<L>
where
    L: LlmService + 'static,
{
    pub fn new(
        session_id: impl Into<String>,
        settings: GenerationSettings,
        llm: L,
        request_timeout: Duration,
        idle_timeout: Duration,
        command_rx: mpsc::Receiver<SessionCommand>,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel(8);
        Self {
            session_id: session_id.into(),
            store: ConversationStore::new(settings),
            llm: Arc::new(llm),
            request_timeout,
            idle_timeout,
            command_rx,
            completion_tx,
            completion_rx,
            broadcast_tx,
            cancel_token: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "Starting session runtime");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // Every handle is gone
                    None => break,
                },
                Some(event) = self.completion_rx.recv() => {
                    self.handle_completion(event);
                }
                () = tokio::time::sleep(self.idle_timeout) => {
                    if self.is_abandoned() {
                        tracing::info!(session_id = %self.session_id, "Session idle, stopping");
                        break;
                    }
                }
            }
        }

        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        tracing::info!(session_id = %self.session_id, "Session runtime stopped");
    }

    /// Nobody is watching and nothing is outstanding
    fn is_abandoned(&self) -> bool {
        self.broadcast_tx.receiver_count() == 0 && !self.store.is_pending()
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Submit { text, reply } => {
                let result = self
                    .store
                    .apply(Event::UserMessage { text })
                    .map(|effects| {
                        self.execute_effects(effects);
                        self.store.snapshot()
                    });
                if let Err(e) = &result {
                    tracing::debug!(session_id = %self.session_id, error = %e, "Submission rejected");
                }
                let _ = reply.send(result);
            }

            SessionCommand::Reset { reply } => {
                let effects = self.store.reset();
                tracing::info!(
                    session_id = %self.session_id,
                    generation = self.store.generation(),
                    "Conversation reset"
                );
                self.execute_effects(effects);
                let _ = reply.send(self.store.snapshot());
            }

            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.store.snapshot());
            }

            SessionCommand::UpdateSettings { settings, reply } => {
                self.store.set_settings(settings);
                tracing::debug!(
                    session_id = %self.session_id,
                    max_output_tokens = settings.max_output_tokens,
                    temperature = settings.temperature,
                    "Generation settings updated"
                );
                let _ = reply.send(self.store.settings());
            }

            SessionCommand::ExportCsv { reply } => {
                let _ = reply.send(self.store.export_csv());
            }
        }
    }

    fn handle_completion(&mut self, event: Event) {
        match self.store.apply(event) {
            Ok(effects) => {
                self.cancel_token = None;
                self.execute_effects(effects);
            }
            Err(TransitionError::StaleGeneration { current, received }) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    current,
                    received,
                    "Discarding completion from before reset"
                );
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Unexpected completion");
                let _ = self.broadcast_tx.send(SseEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::RequestCompletion {
                generation,
                request,
            } => self.spawn_completion(generation, request),

            Effect::AbortCompletion => {
                if let Some(token) = self.cancel_token.take() {
                    token.cancel();
                }
            }

            Effect::NotifyTurn { turn } => {
                let _ = self.broadcast_tx.send(SseEvent::Turn { turn });
            }

            Effect::NotifyStateChange {
                pending,
                generation,
            } => {
                let _ = self.broadcast_tx.send(SseEvent::StateChange {
                    pending,
                    generation,
                });
            }

            Effect::NotifyReset { .. } => {
                let _ = self.broadcast_tx.send(SseEvent::Reset {
                    snapshot: self.store.snapshot(),
                });
            }
        }
    }

    /// Run the request in the background, racing cancellation and the deadline
    fn spawn_completion(&mut self, generation: u64, request: LlmRequest) {
        let cancel_token = CancellationToken::new();
        self.cancel_token = Some(cancel_token.clone());

        let llm = self.llm.clone();
        let completion_tx = self.completion_tx.clone();
        let timeout = self.request_timeout;
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            tracing::info!(session_id = %session_id, generation, "Making completion request");

            let outcome = tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(session_id = %session_id, generation, "Completion request aborted");
                    return;
                }

                result = tokio::time::timeout(timeout, llm.complete(&request)) => {
                    let result = result.unwrap_or_else(|_| {
                        Err(LlmError::transport(format!(
                            "Request timed out after {timeout:?}"
                        )))
                    });
                    CompletionOutcome::from(result)
                }
            };

            let _ = completion_tx
                .send(Event::CompletionSettled {
                    generation,
                    outcome,
                })
                .await;
        });
    }
}
