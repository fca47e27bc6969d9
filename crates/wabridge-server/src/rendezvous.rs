//! The login rendezvous: one caller wants a scannable pairing code, one
//! background task runs the remote handshake that produces it. The code
//! crosses over exactly once; everything after that point is the
//! background task's business and reaches the caller only through state.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use wabridge_core::errors::BridgeError;
use wabridge_session::{EventSink, SessionConnector};

use crate::registry::SessionRegistry;

/// Observable login-flow states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    AwaitingCode,
    CodeDelivered,
    Authenticated,
    Failed,
}

impl LoginState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingCode => "awaiting_code",
            Self::CodeDelivered => "code_delivered",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        }
    }
}

/// Coordinates login attempts. Single-flight: while one attempt is
/// awaiting its code, further attempts are rejected rather than queued or
/// preempted.
pub struct LoginRendezvous {
    state: Arc<Mutex<LoginState>>,
}

impl Default for LoginRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginRendezvous {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LoginState::Idle)),
        }
    }

    pub fn state(&self) -> LoginState {
        *self.state.lock()
    }

    /// Run one login attempt end to end: tear down any existing session,
    /// connect a fresh handle, start the handshake in the background, and
    /// return the first pairing code the remote side issues.
    ///
    /// The caller suspends until the code arrives, the handshake fails
    /// before producing one, or `timeout` elapses. Failures after code
    /// delivery are recorded via the log sink only.
    pub async fn begin_login(
        &self,
        connector: &Arc<dyn SessionConnector>,
        registry: &Arc<SessionRegistry>,
        sink: Arc<dyn EventSink>,
        timeout: Duration,
    ) -> Result<String, BridgeError> {
        {
            let mut state = self.state.lock();
            if *state == LoginState::AwaitingCode {
                return Err(BridgeError::LoginInFlight);
            }
            *state = LoginState::AwaitingCode;
        }

        // The previous session and its buffered history go away before the
        // new handle exists.
        registry.clear().await;

        let client = match connector.connect().await {
            Ok(client) => client,
            Err(e) => {
                set_state(&self.state, LoginState::Failed);
                return Err(e);
            }
        };
        registry.install(Arc::clone(&client)).await;

        let (code_tx, mut code_rx) = mpsc::channel::<String>(4);
        let (delivery_tx, delivery_rx) = oneshot::channel::<Result<String, BridgeError>>();

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            // The pending login request: consumed on first use, so the code
            // (or a pre-code failure) is delivered exactly once.
            let mut delivery = Some(delivery_tx);
            let mut codes_open = true;

            let login = client.login(timeout, code_tx);
            tokio::pin!(login);

            loop {
                tokio::select! {
                    // Biased so a code that is already buffered is always
                    // handed over before the handshake's own resolution is
                    // observed.
                    biased;

                    code = code_rx.recv(), if codes_open => {
                        match code {
                            Some(code) => deliver_code(&state, &mut delivery, code),
                            None => codes_open = false,
                        }
                    }
                    result = &mut login => {
                        // A code buffered in the same poll that resolved the
                        // handshake has not been seen by the recv arm yet;
                        // drain before acting on the outcome.
                        while let Ok(code) = code_rx.try_recv() {
                            deliver_code(&state, &mut delivery, code);
                        }
                        match result {
                            Ok(()) => {
                                client.install_sink(sink);
                                set_state(&state, LoginState::Authenticated);
                                tracing::info!("Handshake complete, event sink installed");
                            }
                            Err(e) => {
                                set_state(&state, LoginState::Failed);
                                match delivery.take() {
                                    // Pre-code failure: the caller is still
                                    // waiting, hand it the error.
                                    Some(tx) => {
                                        let _ = tx.send(Err(e));
                                    }
                                    None => tracing::error!(
                                        error = %e,
                                        error_kind = e.error_kind(),
                                        "Handshake failed after code delivery"
                                    ),
                                }
                            }
                        }
                        break;
                    }
                }
            }
        });

        match tokio::time::timeout(timeout, delivery_rx).await {
            Ok(Ok(Ok(code))) => Ok(code),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_closed)) => {
                // The handshake resolved without ever issuing a code. A
                // credential-restored session lands here authenticated; the
                // pairing contract still has nothing to give the caller.
                Err(BridgeError::HandshakeFailed(
                    "handshake ended without issuing a pairing code".into(),
                ))
            }
            Err(_elapsed) => {
                let mut state = self.state.lock();
                if *state == LoginState::AwaitingCode {
                    *state = LoginState::Failed;
                }
                Err(BridgeError::HandshakeTimeout(timeout))
            }
        }
    }
}

fn set_state(state: &Arc<Mutex<LoginState>>, next: LoginState) {
    let mut guard = state.lock();
    tracing::debug!(from = guard.as_str(), to = next.as_str(), "Login state transition");
    *guard = next;
}

/// Hand a pairing code to the waiting caller. The first code consumes the
/// pending request; refreshes only get logged.
fn deliver_code(
    state: &Arc<Mutex<LoginState>>,
    delivery: &mut Option<oneshot::Sender<Result<String, BridgeError>>>,
    code: String,
) {
    match delivery.take() {
        Some(tx) => {
            set_state(state, LoginState::CodeDelivered);
            let _ = tx.send(Ok(code));
        }
        None => tracing::debug!("Pairing code refreshed"),
    }
}
