//! Scriptable in-process session transport.
//!
//! Used by unit tests to drive the rendezvous and ingestion paths
//! deterministically, and by the binary as its default transport until a
//! real protocol client is linked in.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use wabridge_core::errors::BridgeError;
use wabridge_core::events::{SessionEvent, TextMessage};
use wabridge_core::ids::{MessageId, PeerId};

use crate::client::{EventSink, SessionClient, SessionConnector};

/// What the scripted handshake does after emitting its codes.
enum HandshakeOutcome {
    Complete,
    Fail(String),
    /// Never resolves; the caller's timeout has to fire.
    Stall,
}

/// Pre-programmed session handle for deterministic testing.
pub struct MockSessionClient {
    codes: Vec<String>,
    code_delay: Option<Duration>,
    outcome: HandshakeOutcome,
    /// Echo every sent text back through the sink as an inbound event.
    echo: bool,
    sink: Mutex<Option<Arc<dyn EventSink>>>,
    sent: Mutex<Vec<(PeerId, String)>>,
    history: Mutex<HashMap<PeerId, Vec<TextMessage>>>,
    logged_out: AtomicBool,
}

impl Default for MockSessionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSessionClient {
    /// One pairing code, handshake completes immediately.
    pub fn new() -> Self {
        Self {
            codes: vec!["mock-pairing-code".into()],
            code_delay: None,
            outcome: HandshakeOutcome::Complete,
            echo: false,
            sink: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            history: Mutex::new(HashMap::new()),
            logged_out: AtomicBool::new(false),
        }
    }

    /// Like `new`, but sent texts are reflected back as inbound events so
    /// subscribers see traffic without a real remote peer.
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::new()
        }
    }

    /// Handshake fails without ever emitting a code.
    pub fn failing_before_code(message: &str) -> Self {
        Self {
            codes: Vec::new(),
            outcome: HandshakeOutcome::Fail(message.into()),
            ..Self::new()
        }
    }

    /// Emits its code, then the handshake fails (scan rejected, etc).
    pub fn failing_after_code(message: &str) -> Self {
        Self {
            outcome: HandshakeOutcome::Fail(message.into()),
            ..Self::new()
        }
    }

    /// Emits nothing and never resolves.
    pub fn stalled() -> Self {
        Self {
            codes: Vec::new(),
            outcome: HandshakeOutcome::Stall,
            ..Self::new()
        }
    }

    pub fn with_codes(mut self, codes: Vec<String>) -> Self {
        self.codes = codes;
        self
    }

    pub fn with_code_delay(mut self, delay: Duration) -> Self {
        self.code_delay = Some(delay);
        self
    }

    /// Seed the canned per-peer history served by `load_messages`.
    pub fn with_history(self, peer: PeerId, messages: Vec<TextMessage>) -> Self {
        self.history.lock().insert(peer, messages);
        self
    }

    /// Push an event into the installed sink, as the remote read loop
    /// would. Returns false if no sink is installed yet.
    pub fn emit(&self, event: SessionEvent) -> bool {
        match &*self.sink.lock() {
            Some(sink) => {
                sink.deliver(event);
                true
            }
            None => false,
        }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub fn sent(&self) -> Vec<(PeerId, String)> {
        self.sent.lock().clone()
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SessionClient for MockSessionClient {
    async fn login(
        &self,
        _timeout: Duration,
        codes: mpsc::Sender<String>,
    ) -> Result<(), BridgeError> {
        if let Some(delay) = self.code_delay {
            tokio::time::sleep(delay).await;
        }
        for code in &self.codes {
            let _ = codes.send(code.clone()).await;
        }
        match &self.outcome {
            HandshakeOutcome::Complete => Ok(()),
            HandshakeOutcome::Fail(message) => Err(BridgeError::HandshakeFailed(message.clone())),
            HandshakeOutcome::Stall => {
                drop(codes);
                std::future::pending().await
            }
        }
    }

    fn install_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock() = Some(sink);
    }

    async fn load_messages(
        &self,
        peer: &PeerId,
        _cursor: Option<MessageId>,
        count: usize,
    ) -> Result<Vec<TextMessage>, BridgeError> {
        if self.is_logged_out() {
            return Err(BridgeError::Upstream("session is logged out".into()));
        }
        let history = self.history.lock();
        let messages = history.get(peer).cloned().unwrap_or_default();
        let start = messages.len().saturating_sub(count);
        Ok(messages[start..].to_vec())
    }

    async fn send_text(&self, peer: &PeerId, text: &str) -> Result<(), BridgeError> {
        if self.is_logged_out() {
            return Err(BridgeError::Upstream("session is logged out".into()));
        }
        self.sent.lock().push((peer.clone(), text.to_string()));
        if self.echo {
            self.emit(SessionEvent::Text(TextMessage::inbound(
                peer.clone(),
                text,
            )));
        }
        Ok(())
    }

    async fn logout(&self) -> Result<(), BridgeError> {
        self.logged_out.store(true, Ordering::Relaxed);
        *self.sink.lock() = None;
        Ok(())
    }
}

/// Hands out one scripted client per `connect`, keeping every issued handle
/// reachable for assertions.
pub struct MockConnector {
    factory: Box<dyn Fn() -> MockSessionClient + Send + Sync>,
    issued: Mutex<Vec<Arc<MockSessionClient>>>,
    connect_error: Option<String>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self::with_factory(MockSessionClient::new)
    }

    pub fn echoing() -> Self {
        Self::with_factory(MockSessionClient::echoing)
    }

    pub fn with_factory(
        factory: impl Fn() -> MockSessionClient + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            issued: Mutex::new(Vec::new()),
            connect_error: None,
        }
    }

    /// Every `connect` fails with an upstream error.
    pub fn failing(message: &str) -> Self {
        Self {
            connect_error: Some(message.into()),
            ..Self::new()
        }
    }

    /// The most recently issued handle, if any.
    pub fn last(&self) -> Option<Arc<MockSessionClient>> {
        self.issued.lock().last().cloned()
    }

    pub fn issued_count(&self) -> usize {
        self.issued.lock().len()
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(&self) -> Result<Arc<dyn SessionClient>, BridgeError> {
        if let Some(message) = &self.connect_error {
            return Err(BridgeError::Upstream(message.clone()));
        }
        let client = Arc::new((self.factory)());
        self.issued.lock().push(Arc::clone(&client));
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        events: Mutex<Vec<SessionEvent>>,
    }

    impl EventSink for RecordingSink {
        fn deliver(&self, event: SessionEvent) {
            self.events.lock().push(event);
        }
    }

    #[tokio::test]
    async fn login_emits_code_then_completes() {
        let client = MockSessionClient::new();
        let (tx, mut rx) = mpsc::channel(4);

        let result = client.login(Duration::from_secs(1), tx).await;
        assert!(result.is_ok());
        assert_eq!(rx.recv().await.unwrap(), "mock-pairing-code");
    }

    #[tokio::test]
    async fn failing_before_code_emits_nothing() {
        let client = MockSessionClient::failing_before_code("refused");
        let (tx, mut rx) = mpsc::channel(4);

        let result = client.login(Duration::from_secs(1), tx).await;
        assert!(matches!(result, Err(BridgeError::HandshakeFailed(_))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn emit_requires_installed_sink() {
        let client = MockSessionClient::new();
        let event = SessionEvent::Raw { payload: "{}".into() };
        assert!(!client.emit(event.clone()));

        let sink = Arc::new(RecordingSink { events: Mutex::new(Vec::new()) });
        client.install_sink(sink.clone());
        assert!(client.emit(event));
        assert_eq!(sink.events.lock().len(), 1);
    }

    #[tokio::test]
    async fn echo_reflects_sends_into_sink() {
        let client = MockSessionClient::echoing();
        let sink = Arc::new(RecordingSink { events: Mutex::new(Vec::new()) });
        client.install_sink(sink.clone());

        let peer = PeerId::new("49155");
        client.send_text(&peer, "ping").await.unwrap();

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        match &events[0] {
            SessionEvent::Text(msg) => {
                assert_eq!(msg.text, "ping");
                assert_eq!(msg.info.remote_peer, peer);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_messages_returns_most_recent() {
        let peer = PeerId::new("49155");
        let messages: Vec<TextMessage> = (0..5)
            .map(|i| TextMessage::inbound(peer.clone(), format!("m{i}")))
            .collect();
        let client = MockSessionClient::new().with_history(peer.clone(), messages);

        let loaded = client.load_messages(&peer, None, 2).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].text, "m3");
        assert_eq!(loaded[1].text, "m4");
    }

    #[tokio::test]
    async fn logout_blocks_further_use() {
        let client = MockSessionClient::new();
        client.logout().await.unwrap();
        assert!(client.is_logged_out());

        let peer = PeerId::new("49155");
        assert!(client.send_text(&peer, "hi").await.is_err());
        assert!(client.load_messages(&peer, None, 10).await.is_err());
    }

    #[tokio::test]
    async fn connector_issues_fresh_handles() {
        let connector = MockConnector::new();
        let a = connector.connect().await.unwrap();
        let b = connector.connect().await.unwrap();
        assert_eq!(connector.issued_count(), 2);
        // Distinct handles per login attempt.
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn failing_connector_surfaces_upstream_error() {
        let connector = MockConnector::failing("socket refused");
        let result = connector.connect().await;
        assert!(matches!(result, Err(BridgeError::Upstream(_))));
    }
}
