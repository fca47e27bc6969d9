use std::time::Duration;

/// Error taxonomy for the bridge. Request-path variants surface to the
/// caller synchronously; the rest are recorded through the tracing sink and
/// drive internal state transitions.
#[derive(Clone, Debug, thiserror::Error)]
pub enum BridgeError {
    // Request path
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Reject-concurrent single-flight policy: a login is already awaiting
    /// its pairing code.
    #[error("a login is already in progress")]
    LoginInFlight,

    // Handshake
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    // Delivery
    #[error("hub is closed")]
    HubClosed,
    #[error("subscriber disconnected for slow consumption")]
    DeliveryBackpressure,

    // Remote transport
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::BadRequest(_) => "bad_request",
            Self::LoginInFlight => "login_in_flight",
            Self::HandshakeTimeout(_) => "handshake_timeout",
            Self::HandshakeFailed(_) => "handshake_failed",
            Self::HubClosed => "hub_closed",
            Self::DeliveryBackpressure => "delivery_backpressure",
            Self::Upstream(_) => "upstream_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the error belongs to a synchronous request path. Everything
    /// else is only ever reported via logging.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated | Self::BadRequest(_) | Self::LoginInFlight
        )
    }
}
