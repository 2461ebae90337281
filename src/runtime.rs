//! Runtime for executing conversations
//!
//! One task per session owns its `ConversationStore`. HTTP handlers talk to
//! it through a [`SessionHandle`]; updates fan out to SSE subscribers over a
//! broadcast channel.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::conversation::{ConversationSnapshot, GenerationSettings, TransitionError, Turn};
use crate::llm::LlmService;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};

/// Type alias for production runtime with the configured provider
pub type ProductionRuntime = SessionRuntime<Arc<dyn LlmService>>;

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 128;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session runtime has stopped")]
    Closed,
    #[error(transparent)]
    Rejected(#[from] TransitionError),
}

/// Requests handled by a session's runtime task, each with its reply channel
#[derive(Debug)]
pub enum SessionCommand {
    Submit {
        text: String,
        reply: oneshot::Sender<Result<ConversationSnapshot, TransitionError>>,
    },
    Reset {
        reply: oneshot::Sender<ConversationSnapshot>,
    },
    Snapshot {
        reply: oneshot::Sender<ConversationSnapshot>,
    },
    UpdateSettings {
        settings: GenerationSettings,
        reply: oneshot::Sender<GenerationSettings>,
    },
    ExportCsv {
        reply: oneshot::Sender<String>,
    },
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { snapshot: ConversationSnapshot },
    Turn { turn: Turn },
    StateChange { pending: bool, generation: u64 },
    Reset { snapshot: ConversationSnapshot },
    Error { message: String },
}

/// Handle to interact with a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: String,
    command_tx: mpsc::Sender<SessionCommand>,
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl SessionHandle {
    pub fn new(
        id: impl Into<String>,
        command_tx: mpsc::Sender<SessionCommand>,
        broadcast_tx: broadcast::Sender<SseEvent>,
    ) -> Self {
        Self {
            id: id.into(),
            command_tx,
            broadcast_tx,
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Submit a user turn; the snapshot returned is already pending
    pub async fn submit(&self, text: impl Into<String>) -> Result<ConversationSnapshot, SessionError> {
        let text = text.into();
        Ok(self
            .request(|reply| SessionCommand::Submit { text, reply })
            .await??)
    }

    pub async fn reset(&self) -> Result<ConversationSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Reset { reply }).await
    }

    pub async fn snapshot(&self) -> Result<ConversationSnapshot, SessionError> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    pub async fn update_settings(
        &self,
        settings: GenerationSettings,
    ) -> Result<GenerationSettings, SessionError> {
        self.request(|reply| SessionCommand::UpdateSettings { settings, reply })
            .await
    }

    pub async fn export_csv(&self) -> Result<String, SessionError> {
        self.request(|reply| SessionCommand::ExportCsv { reply }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }
}

/// Manager for all session runtimes
///
/// A runtime stops once its session sits idle with no stream subscribers,
/// and its entry is removed when the task ends.
pub struct SessionManager {
    llm: Arc<dyn LlmService>,
    request_timeout: Duration,
    idle_timeout: Duration,
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionManager {
    pub fn new(
        llm: Arc<dyn LlmService>,
        request_timeout: Duration,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            llm,
            request_timeout,
            idle_timeout,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// Start a fresh session and its runtime task
    pub async fn create(&self) -> SessionHandle {
        let session_id = uuid::Uuid::new_v4().to_string();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        let runtime: ProductionRuntime = SessionRuntime::new(
            &session_id,
            GenerationSettings::default(),
            self.llm.clone(),
            self.request_timeout,
            self.idle_timeout,
            command_rx,
            broadcast_tx.clone(),
        );

        let handle = SessionHandle::new(&session_id, command_tx, broadcast_tx);
        // Registered before the task starts; the task removes it on exit
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), handle.clone());

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            runtime.run().await;
            sessions.write().await.remove(&session_id);
            tracing::info!(session_id = %session_id, "Session runtime finished");
        });

        handle
    }

    /// Number of sessions with a running runtime
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }
}
