//! The ingestion bridge: classifies every inbound session event and routes
//! it to the history buffer and the broadcast hub.

use std::sync::Arc;

use bytes::Bytes;

use wabridge_core::events::SessionEvent;
use wabridge_session::EventSink;

use crate::hub::Hub;
use crate::registry::MessageHistory;

/// Installed on the session client at handshake completion; from then on
/// every remote event lands here.
pub struct IngestBridge {
    hub: Arc<Hub>,
    history: Arc<MessageHistory>,
}

impl IngestBridge {
    pub fn new(hub: Arc<Hub>, history: Arc<MessageHistory>) -> Self {
        Self { hub, history }
    }

    fn forward(&self, event: &SessionEvent) {
        match serde_json::to_vec(event) {
            Ok(json) => self.hub.broadcast(Bytes::from(json)),
            Err(e) => tracing::error!(
                error = %e,
                event_type = event.event_type(),
                "Failed to serialize event"
            ),
        }
    }
}

impl EventSink for IngestBridge {
    // Synchronous on purpose: events from one session stay FIFO because
    // nothing here yields between classification and hand-off to the hub.
    fn deliver(&self, event: SessionEvent) {
        match event {
            SessionEvent::Text(message) => {
                tracing::debug!(
                    peer = %message.info.remote_peer,
                    message_id = %message.info.id,
                    "Text message received"
                );
                self.history.append(message.clone());
                self.forward(&SessionEvent::Text(message));
            }
            SessionEvent::Raw { payload } => {
                self.forward(&SessionEvent::Raw { payload });
            }
            event @ (SessionEvent::Image(_) | SessionEvent::Video(_)) => {
                // Observed only; media never enters history or the hub.
                tracing::info!(event_type = event.event_type(), "Media message observed");
            }
            SessionEvent::Error { message } => {
                tracing::error!(error = %message, "Session transport error");
            }
        }
    }
}
