//! Server bootstrap: shared state, router, WebSocket upgrade, and the
//! background tasks that keep the hub healthy.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use wabridge_session::SessionConnector;

use crate::bridge::IngestBridge;
use crate::handlers;
use crate::hub::{self, Hub};
use crate::registry::{MessageHistory, SessionRegistry};
use crate::rendezvous::LoginRendezvous;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
    /// Remote handshake window: how long a pairing code may wait to be
    /// scanned before the login fails.
    pub login_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 10010,
            max_send_queue: 256,
            login_timeout_secs: 600,
        }
    }
}

/// Shared application state threaded through every handler. Constructed
/// once at startup; nothing here is ambient.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub registry: Arc<SessionRegistry>,
    pub history: Arc<MessageHistory>,
    pub rendezvous: Arc<LoginRendezvous>,
    pub connector: Arc<dyn SessionConnector>,
    pub sink: Arc<IngestBridge>,
    pub login_timeout: Duration,
}

impl AppState {
    pub fn new(config: &ServerConfig, connector: Arc<dyn SessionConnector>) -> Self {
        let hub = Arc::new(Hub::new(config.max_send_queue));
        let registry = Arc::new(SessionRegistry::new());
        let history = registry.history();
        let sink = Arc::new(IngestBridge::new(Arc::clone(&hub), Arc::clone(&history)));

        Self {
            hub,
            registry,
            history,
            rendezvous: Arc::new(LoginRendezvous::new()),
            connector,
            sink,
            login_timeout: Duration::from_secs(config.login_timeout_secs),
        }
    }
}

/// Build the axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/login", get(handlers::login))
        .route("/read_all", get(handlers::read_all))
        .route("/read", get(handlers::read))
        .route("/send", get(handlers::send))
        .route("/health", get(handlers::health))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. Returns a handle that keeps the background
/// tasks alive.
pub async fn start(
    config: ServerConfig,
    connector: Arc<dyn SessionConnector>,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState::new(&config, connector);
    let sweep = hub::start_sweep_task(Arc::clone(&state.hub), Duration::from_secs(60));

    let router = build_router(state.clone());
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "wabridge server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        state,
        _server: server,
        _sweep: sweep,
    })
}

/// Handle returned by `start()`: keeps the background tasks alive and
/// carries the shared state.
pub struct ServerHandle {
    pub port: u16,
    pub state: AppState,
    _server: tokio::task::JoinHandle<()>,
    _sweep: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade: register with the hub, then drive the connection.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (subscriber_id, rx) = match state.hub.register() {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected subscriber, hub closed");
            return;
        }
    };
    tracing::info!(subscriber_id = %subscriber_id, "Subscriber connected");

    hub::handle_ws_connection(socket, subscriber_id, rx, Arc::clone(&state.hub)).await;
}
