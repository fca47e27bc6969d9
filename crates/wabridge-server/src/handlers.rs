//! HTTP handlers: the thin request surface over the rendezvous, registry,
//! and hub.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use wabridge_core::errors::BridgeError;
use wabridge_core::ids::PeerId;

use crate::qr;
use crate::server::AppState;

const DEFAULT_READ_COUNT: usize = 10;

pub(crate) fn status_for(error: &BridgeError) -> StatusCode {
    match error {
        BridgeError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        BridgeError::BadRequest(_) => StatusCode::BAD_REQUEST,
        BridgeError::LoginInFlight => StatusCode::CONFLICT,
        BridgeError::HandshakeTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        BridgeError::HandshakeFailed(_) | BridgeError::Upstream(_) => StatusCode::BAD_GATEWAY,
        BridgeError::HubClosed | BridgeError::DeliveryBackpressure => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &BridgeError) -> Response {
    let body = serde_json::json!({
        "error": error.to_string(),
        "kind": error.error_kind(),
    });
    (status_for(error), Json(body)).into_response()
}

// ── Login ──

/// Start a login attempt and respond with the pairing code as a PNG QR.
pub async fn login(State(state): State<AppState>) -> Response {
    let result = state
        .rendezvous
        .begin_login(
            &state.connector,
            &state.registry,
            state.sink.clone(),
            state.login_timeout,
        )
        .await;

    match result {
        Ok(code) => match qr::render_png(&code) {
            Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Pairing code rendering failed");
                error_response(&e)
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, error_kind = e.error_kind(), "Login failed");
            error_response(&e)
        }
    }
}

// ── History ──

/// Full snapshot of the text messages buffered over the current session.
pub async fn read_all(State(state): State<AppState>) -> Response {
    if state.registry.current().await.is_none() {
        return error_response(&BridgeError::NotAuthenticated);
    }
    Json(state.history.snapshot()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ReadParams {
    phone: Option<String>,
    count: Option<String>,
}

/// The most recent messages for one peer, fetched through the session
/// client. `count` defaults to 10; non-numeric or zero values fall back to
/// the default.
pub async fn read(State(state): State<AppState>, Query(params): Query<ReadParams>) -> Response {
    let Some(client) = state.registry.current().await else {
        return error_response(&BridgeError::NotAuthenticated);
    };
    let Some(phone) = params.phone.filter(|p| !p.is_empty()) else {
        return error_response(&BridgeError::BadRequest(
            "missing required parameter: phone".into(),
        ));
    };
    let count = params
        .count
        .as_deref()
        .and_then(|c| c.parse::<usize>().ok())
        .filter(|&n| n != 0)
        .unwrap_or(DEFAULT_READ_COUNT);

    let peer = PeerId::new(phone);
    match client.load_messages(&peer, None, count).await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, peer = %peer, "History load failed");
            error_response(&e)
        }
    }
}

// ── Send ──

#[derive(Debug, Deserialize)]
pub struct SendParams {
    phone: Option<String>,
    text: Option<String>,
}

pub async fn send(State(state): State<AppState>, Query(params): Query<SendParams>) -> Response {
    let Some(client) = state.registry.current().await else {
        return error_response(&BridgeError::NotAuthenticated);
    };
    let (Some(phone), Some(text)) = (
        params.phone.filter(|p| !p.is_empty()),
        params.text.filter(|t| !t.is_empty()),
    ) else {
        return error_response(&BridgeError::BadRequest(
            "missing required parameter: phone and text".into(),
        ));
    };

    let peer = PeerId::new(phone);
    match client.send_text(&peer, &text).await {
        Ok(()) => Json(serde_json::json!({"sent": true})).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, peer = %peer, "Send failed");
            error_response(&e)
        }
    }
}

// ── Health ──

pub async fn health(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "subscribers": state.hub.count(),
        "authenticated": state.registry.current().await.is_some(),
        "login_state": state.rendezvous.state().as_str(),
    }))
    .into_response()
}
