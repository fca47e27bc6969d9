//! Process-wide session state: the single-slot session registry and the
//! in-memory text-message history that lives and dies with it.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use wabridge_core::events::TextMessage;
use wabridge_session::SessionClient;

/// Insertion-ordered buffer of text messages received over the current
/// session. Unbounded for the lifetime of the session; cleared on every new
/// login so nothing leaks across accounts.
#[derive(Default)]
pub struct MessageHistory {
    entries: RwLock<Vec<TextMessage>>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, message: TextMessage) {
        self.entries.write().push(message);
    }

    /// Full snapshot in receipt order. Reads a consistent prefix; an
    /// in-flight append may or may not be visible.
    pub fn snapshot(&self) -> Vec<TextMessage> {
        self.entries.read().clone()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Holds at most one active session handle. All slot mutation goes through
/// this type; the handle is only ever replaced after the previous one has
/// been torn down and its buffered history discarded.
pub struct SessionRegistry {
    current: Mutex<Option<Arc<dyn SessionClient>>>,
    history: Arc<MessageHistory>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
            history: Arc::new(MessageHistory::new()),
        }
    }

    pub fn history(&self) -> Arc<MessageHistory> {
        Arc::clone(&self.history)
    }

    /// Install a new session handle. Any existing handle is logged out and
    /// the history cleared as part of the same operation.
    pub async fn install(&self, handle: Arc<dyn SessionClient>) {
        let mut slot = self.current.lock().await;
        if let Some(old) = slot.take() {
            if let Err(e) = old.logout().await {
                tracing::warn!(error = %e, "Logout of replaced session failed");
            } else {
                tracing::info!("Logged out previous session");
            }
        }
        self.history.clear();
        *slot = Some(handle);
    }

    /// The active handle, or `None` when no session exists.
    pub async fn current(&self) -> Option<Arc<dyn SessionClient>> {
        self.current.lock().await.clone()
    }

    /// Tear down and remove the current handle, clearing its history.
    pub async fn clear(&self) {
        let mut slot = self.current.lock().await;
        if let Some(old) = slot.take() {
            if let Err(e) = old.logout().await {
                tracing::warn!(error = %e, "Logout during teardown failed");
            }
        }
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wabridge_core::ids::PeerId;
    use wabridge_session::MockSessionClient;

    fn text(peer: &str, body: &str) -> TextMessage {
        TextMessage::inbound(PeerId::new(peer), body)
    }

    #[test]
    fn history_appends_in_receipt_order() {
        let history = MessageHistory::new();
        history.append(text("1", "first"));
        history.append(text("1", "second"));
        history.append(text("2", "third"));

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].text, "first");
        assert_eq!(snapshot[1].text, "second");
        assert_eq!(snapshot[2].text, "third");
    }

    #[test]
    fn history_clear_empties() {
        let history = MessageHistory::new();
        history.append(text("1", "a"));
        assert!(!history.is_empty());

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }

    #[tokio::test]
    async fn registry_starts_absent() {
        let registry = SessionRegistry::new();
        assert!(registry.current().await.is_none());
    }

    #[tokio::test]
    async fn install_makes_handle_current() {
        let registry = SessionRegistry::new();
        registry.install(Arc::new(MockSessionClient::new())).await;
        assert!(registry.current().await.is_some());
    }

    #[tokio::test]
    async fn install_replaces_and_logs_out_old_handle() {
        let registry = SessionRegistry::new();
        let old = Arc::new(MockSessionClient::new());
        registry.install(old.clone()).await;

        registry.history().append(text("1", "stale"));

        registry.install(Arc::new(MockSessionClient::new())).await;
        assert!(old.is_logged_out());
        assert!(registry.history().is_empty());
        assert!(registry.current().await.is_some());
    }

    #[tokio::test]
    async fn clear_tears_down_and_empties_history() {
        let registry = SessionRegistry::new();
        let handle = Arc::new(MockSessionClient::new());
        registry.install(handle.clone()).await;
        registry.history().append(text("1", "buffered"));

        registry.clear().await;

        assert!(handle.is_logged_out());
        assert!(registry.current().await.is_none());
        assert!(registry.history().is_empty());
    }

    #[tokio::test]
    async fn clear_without_session_is_noop() {
        let registry = SessionRegistry::new();
        registry.clear().await;
        assert!(registry.current().await.is_none());
    }
}
