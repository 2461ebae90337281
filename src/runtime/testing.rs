//! Mock implementations for testing
//!
//! These mocks drive a real `SessionRuntime` without any network I/O.

use super::{SessionCommand, SessionHandle, SessionRuntime, SseEvent};
use crate::conversation::GenerationSettings;
use crate::llm::{LlmError, LlmRequest, LlmResponse, LlmService};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify};

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, text: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(LlmResponse::text(text)));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::transport("No mock response queued")))
    }
}

#[async_trait]
impl LlmService for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.next_response(request)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Delayed Mock LLM Client (for reset and timeout testing)
// ============================================================================

/// Mock LLM client that sleeps before answering
pub struct DelayedMockLlmClient {
    inner: MockLlmClient,
    delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockLlmClient {
    pub fn new(model_id: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: MockLlmClient::new(model_id),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_response(&self, text: &str) {
        self.inner.queue_response(text);
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl LlmService for DelayedMockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        // notify_one keeps a permit, so a waiter arriving late still wakes
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.next_response(request)
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// Test Session
// ============================================================================

/// A running session wired to a mock client
pub struct TestSession<L: LlmService + 'static> {
    pub handle: SessionHandle,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
    pub llm: Arc<L>,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl<L: LlmService + 'static> TestSession<L> {
    pub fn start(llm: L) -> Self {
        Self::start_with_timeout(llm, Duration::from_secs(5))
    }

    pub fn start_with_timeout(llm: L, request_timeout: Duration) -> Self {
        Self::start_with_limits(llm, request_timeout, Duration::from_secs(3600))
    }

    pub fn start_with_limits(llm: L, request_timeout: Duration, idle_timeout: Duration) -> Self {
        let llm = Arc::new(llm);
        let (command_tx, command_rx) = mpsc::channel::<SessionCommand>(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);

        let runtime = SessionRuntime::new(
            "test-session",
            GenerationSettings::default(),
            llm.clone(),
            request_timeout,
            idle_timeout,
            command_rx,
            broadcast_tx.clone(),
        );
        let runtime_handle = tokio::spawn(runtime.run());

        Self {
            handle: SessionHandle::new("test-session", command_tx, broadcast_tx),
            broadcast_rx,
            llm,
            _runtime_handle: runtime_handle,
        }
    }

    /// Wait until the conversation is no longer pending
    pub async fn wait_for_idle(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SseEvent::StateChange { pending: false, .. })) => return true,
                _ => continue,
            }
        }
        false
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{decode_csv, TransitionError, Turn, SYSTEM_PROMPT};
    use crate::llm::LlmErrorKind;
    use crate::runtime::SessionError;

    #[tokio::test]
    async fn test_mock_llm_client() {
        let mock = MockLlmClient::new("test-model");
        mock.queue_response("Hello");

        let request = LlmRequest {
            messages: vec![],
            max_output_tokens: 1500,
            temperature: 0.7,
        };
        let response = mock.complete(&request).await.unwrap();
        assert_eq!(response.text, "Hello");
        assert_eq!(mock.recorded_requests().len(), 1);

        let err = mock.complete(&request).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_simple_reply() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response("Hi there!");

        let mut session = TestSession::start(llm);
        let snapshot = session.handle.submit("Hello").await.unwrap();
        assert!(snapshot.pending);
        assert_eq!(snapshot.turns.len(), 2);

        assert!(session.wait_for_idle(Duration::from_secs(2)).await);

        let snapshot = session.handle.snapshot().await.unwrap();
        assert_eq!(
            snapshot.turns,
            vec![
                Turn::system(SYSTEM_PROMPT),
                Turn::user("Hello"),
                Turn::assistant("Hi there!"),
            ]
        );
        assert!(!snapshot.pending);
    }

    #[tokio::test]
    async fn test_turns_are_broadcast_in_order() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response("Hi");

        let mut session = TestSession::start(llm);
        session.handle.submit("Hello").await.unwrap();

        let mut seen = Vec::new();
        while seen.len() < 4 {
            let event = tokio::time::timeout(Duration::from_secs(2), session.broadcast_rx.recv())
                .await
                .expect("timed out waiting for broadcast")
                .unwrap();
            seen.push(event);
        }

        assert!(matches!(&seen[0], SseEvent::Turn { turn } if turn == &Turn::user("Hello")));
        assert!(matches!(seen[1], SseEvent::StateChange { pending: true, .. }));
        assert!(matches!(&seen[2], SseEvent::Turn { turn } if turn == &Turn::assistant("Hi")));
        assert!(matches!(seen[3], SseEvent::StateChange { pending: false, .. }));
    }

    #[tokio::test]
    async fn test_submission_rejected_while_pending() {
        let llm = DelayedMockLlmClient::new("test-model", Duration::from_millis(200));
        llm.queue_response("first reply");

        let mut session = TestSession::start(llm);
        session.handle.submit("Hello").await.unwrap();

        let err = session.handle.submit("Again").await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(TransitionError::Busy)));
        assert_eq!(session.handle.snapshot().await.unwrap().turns.len(), 2);

        assert!(session.wait_for_idle(Duration::from_secs(2)).await);
        assert!(session.handle.submit("Again").await.is_ok());
    }

    #[tokio::test]
    async fn test_blank_submission_rejected() {
        let session = TestSession::start(MockLlmClient::new("test-model"));

        let err = session.handle.submit("   ").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Rejected(TransitionError::EmptyMessage)
        ));
        assert!(session.llm.recorded_requests().is_empty());
    }

    #[tokio::test]
    async fn test_llm_error_becomes_error_turn() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_error(LlmError::auth("Invalid API key"));

        let mut session = TestSession::start(llm);
        session.handle.submit("Hello").await.unwrap();
        assert!(session.wait_for_idle(Duration::from_secs(2)).await);

        let snapshot = session.handle.snapshot().await.unwrap();
        assert_eq!(
            snapshot.turns.last(),
            Some(&Turn::error(LlmErrorKind::Auth, "Invalid API key"))
        );
        assert!(!snapshot.pending);
    }

    #[tokio::test]
    async fn test_reset_mid_flight_discards_late_reply() {
        let llm = DelayedMockLlmClient::new("test-model", Duration::from_millis(200));
        llm.queue_response("Response that should be discarded");
        let started = llm.request_started.clone();

        let session = TestSession::start(llm);
        session.handle.submit("Hello").await.unwrap();
        started.notified().await;

        let snapshot = session.handle.reset().await.unwrap();
        assert_eq!(snapshot.turns, vec![Turn::system(SYSTEM_PROMPT)]);
        assert!(!snapshot.pending);
        assert_eq!(snapshot.generation, 1);

        tokio::time::sleep(Duration::from_millis(400)).await;

        let snapshot = session.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.turns, vec![Turn::system(SYSTEM_PROMPT)]);
        assert!(!snapshot.pending);
    }

    #[tokio::test]
    async fn test_new_request_after_reset_is_not_settled_by_old_one() {
        let llm = DelayedMockLlmClient::new("test-model", Duration::from_millis(150));
        llm.queue_response("for first");
        llm.queue_response("for second");
        let started = llm.request_started.clone();

        let mut session = TestSession::start(llm);
        session.handle.submit("first").await.unwrap();
        started.notified().await;
        session.handle.reset().await.unwrap();
        session.handle.submit("second").await.unwrap();

        assert!(session.wait_for_idle(Duration::from_secs(2)).await);
        let snapshot = session.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.turns.len(), 3);
        assert_eq!(snapshot.turns[1], Turn::user("second"));
        assert_eq!(snapshot.turns[2].role(), "assistant");
    }

    #[tokio::test]
    async fn test_request_deadline_settles_as_transport_error() {
        let llm = DelayedMockLlmClient::new("test-model", Duration::from_secs(5));
        llm.queue_response("never delivered");

        let mut session = TestSession::start_with_timeout(llm, Duration::from_millis(50));
        session.handle.submit("Hello").await.unwrap();
        assert!(session.wait_for_idle(Duration::from_secs(2)).await);

        let snapshot = session.handle.snapshot().await.unwrap();
        let Some(Turn::Error {
            content,
            error_kind,
        }) = snapshot.turns.last()
        else {
            panic!("Expected an error turn, got {:?}", snapshot.turns.last());
        };
        assert_eq!(*error_kind, LlmErrorKind::Transport);
        assert!(content.contains("timed out after 50ms"), "{content}");
    }

    #[tokio::test]
    async fn test_settings_flow_into_next_request() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response("ok");

        let mut session = TestSession::start(llm);
        let applied = session
            .handle
            .update_settings(GenerationSettings::new(2000, 0.2).unwrap())
            .await
            .unwrap();
        assert_eq!(applied.max_output_tokens, 2000);

        session.handle.submit("Hello").await.unwrap();
        assert!(session.wait_for_idle(Duration::from_secs(2)).await);

        let requests = session.llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_output_tokens, 2000);
        assert!((requests[0].temperature - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_prompt_excludes_error_turns() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_error(LlmError::transport("Connection failed"));
        llm.queue_response("Hi");

        let mut session = TestSession::start(llm);
        session.handle.submit("Hello").await.unwrap();
        assert!(session.wait_for_idle(Duration::from_secs(2)).await);
        session.handle.submit("Hello").await.unwrap();
        assert!(session.wait_for_idle(Duration::from_secs(2)).await);

        let requests = session.llm.recorded_requests();
        assert_eq!(requests[1].messages.len(), 3);
        assert!(requests[1].messages.iter().all(|m| m.content != "Connection failed"));
    }

    #[tokio::test]
    async fn test_export_through_handle() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_response("a, \"quoted\"\nreply");

        let mut session = TestSession::start(llm);
        session.handle.submit("Hello").await.unwrap();
        assert!(session.wait_for_idle(Duration::from_secs(2)).await);

        let csv = session.handle.export_csv().await.unwrap();
        let rows = decode_csv(&csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].1, "a, \"quoted\"\nreply");
    }

    #[tokio::test]
    async fn test_manager_creates_and_finds_sessions() {
        use crate::runtime::SessionManager;

        let llm: Arc<dyn LlmService> = Arc::new(MockLlmClient::new("test-model"));
        let manager = SessionManager::new(llm, Duration::from_secs(5), Duration::from_secs(3600));
        assert_eq!(manager.model_id(), "test-model");

        let handle = manager.create().await;
        let found = manager.get(&handle.id).await.unwrap();
        assert_eq!(found.id, handle.id);
        assert_eq!(found.snapshot().await.unwrap().turns.len(), 1);

        assert!(matches!(
            manager.get("missing").await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_idle_sessions_are_dropped() {
        use crate::runtime::SessionManager;

        let llm: Arc<dyn LlmService> = Arc::new(MockLlmClient::new("test-model"));
        let manager = SessionManager::new(llm, Duration::from_secs(5), Duration::from_millis(50));

        let mut ids = Vec::new();
        for _ in 0..100 {
            ids.push(manager.create().await.id);
        }
        assert_eq!(manager.session_count().await, 100);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(manager.session_count().await, 0);
        assert!(matches!(
            manager.get(&ids[0]).await,
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribed_session_outlives_idle_timeout() {
        use crate::runtime::SessionManager;

        let llm: Arc<dyn LlmService> = Arc::new(MockLlmClient::new("test-model"));
        let manager = SessionManager::new(llm, Duration::from_secs(5), Duration::from_millis(50));

        let watched = manager.create().await;
        let _stream = watched.subscribe();
        manager.create().await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(manager.session_count().await, 1);
        assert_eq!(watched.snapshot().await.unwrap().turns.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_session_outlives_idle_timeout() {
        let llm = DelayedMockLlmClient::new("test-model", Duration::from_millis(300));
        llm.queue_response("slow reply");

        let session = TestSession::start_with_limits(
            llm,
            Duration::from_secs(5),
            Duration::from_millis(50),
        );
        let TestSession {
            handle,
            broadcast_rx,
            ..
        } = session;
        handle.submit("Hello").await.unwrap();
        drop(broadcast_rx);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.pending);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.turns.last(), Some(&Turn::assistant("slow reply")));

        // Idle, unwatched and settled: the runtime stops
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(matches!(handle.snapshot().await, Err(SessionError::Closed)));
    }
}
