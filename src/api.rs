//! HTTP API for the chat page

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::llm::LlmService;
use crate::runtime::SessionManager;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(
        llm: Arc<dyn LlmService>,
        request_timeout: Duration,
        session_idle_timeout: Duration,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(
                llm,
                request_timeout,
                session_idle_timeout,
            )),
        }
    }
}
