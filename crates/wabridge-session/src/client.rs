//! Capability seams around the remote messaging protocol.
//!
//! The actual wire protocol (handshake crypto, message transport, history
//! sync) lives behind `SessionClient`; the bridge only coordinates around
//! it. `EventSink` is the reverse capability: the ingestion bridge
//! implements it and the client calls it for every inbound event once the
//! handshake has completed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wabridge_core::errors::BridgeError;
use wabridge_core::events::{SessionEvent, TextMessage};
use wabridge_core::ids::{MessageId, PeerId};

/// Receives every inbound event from an authenticated session.
///
/// `deliver` must not block: implementations queue or drop internally so a
/// slow local consumer can never stall the remote transport's read loop.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: SessionEvent);
}

/// One remote messaging session: the session handle the registry owns.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Perform the remote authentication handshake, bounded by `timeout`.
    ///
    /// Pairing codes are emitted on `codes` as the remote end issues them
    /// (the code may be refreshed while it waits to be scanned). Resolves
    /// `Ok` once the handshake completes, or the error that ended it.
    async fn login(
        &self,
        timeout: Duration,
        codes: mpsc::Sender<String>,
    ) -> Result<(), BridgeError>;

    /// Install the sink that receives inbound events. Replaces any
    /// previously installed sink.
    fn install_sink(&self, sink: Arc<dyn EventSink>);

    /// Load up to `count` messages for `peer`, most recent last,
    /// optionally paging backwards from `cursor`.
    async fn load_messages(
        &self,
        peer: &PeerId,
        cursor: Option<MessageId>,
        count: usize,
    ) -> Result<Vec<TextMessage>, BridgeError>;

    /// Send a text message to `peer`.
    async fn send_text(&self, peer: &PeerId, text: &str) -> Result<(), BridgeError>;

    /// Tear down the remote session.
    async fn logout(&self) -> Result<(), BridgeError>;
}

/// Produces one fresh `SessionClient` per login attempt. A handle is never
/// reused across logins; replacement goes through the session registry.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn SessionClient>, BridgeError>;
}
