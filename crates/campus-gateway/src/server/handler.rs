//! WebSocket handler
//!
//! Authenticates the handshake, registers the connection, and runs the
//! frame pump until disconnect. Teardown is routed through the engine's
//! idempotent disconnect path, so duplicate close signals are harmless.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use campus_api::response::ApiError;
use campus_api::AppState;
use campus_core::Snowflake;
use campus_realtime::{ClientCommand, ClientEnvelope, ConnectionId};

/// Handshake query parameters
///
/// Browsers cannot set headers on a WebSocket upgrade, so the bearer token
/// is also accepted as a query parameter.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// WebSocket gateway endpoint
///
/// The credential is verified before the upgrade; a bad or missing token
/// refuses the connection with an authentication error and mutates nothing.
pub async fn gateway_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Response {
    let token = params
        .token
        .or_else(|| bearer.map(|TypedHeader(Authorization(b))| b.token().to_string()));

    let Some(token) = token else {
        return ApiError::MissingAuth.into_response();
    };

    match state.verifier().verify(&token) {
        Ok(user_id) => ws.on_upgrade(move |socket| handle_socket(state, user_id, socket)),
        Err(e) => {
            tracing::warn!(error = %e, "WebSocket handshake refused");
            ApiError::App(e).into_response()
        }
    }
}

/// Run one authenticated connection to completion
async fn handle_socket(state: AppState, user_id: Snowflake, socket: WebSocket) {
    let conn = ConnectionId::generate();
    let buffer = state.config().gateway.message_buffer;
    let (tx, mut rx) = tokio::sync::mpsc::channel(buffer);

    state.dispatcher().attach(conn.clone(), tx);
    let (emissions, displaced) = state.engine().on_connect(user_id, &conn);
    if let Some(old) = displaced {
        // The superseded socket stays attached and keeps receiving group
        // traffic; it only loses registry-targeted sends.
        tracing::debug!(user_id = %user_id, old = %old, new = %conn, "Connection displaced");
    }
    state.dispatcher().deliver(emissions).await;

    tracing::info!(user_id = %user_id, connection = %conn, "WebSocket connection established");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Outbound pump: dispatcher queue -> socket
    let conn_send = conn.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if ws_sink.send(Message::Text(json.into())).await.is_err() {
                        tracing::debug!(connection = %conn_send, "Socket send failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(connection = %conn_send, error = %e, "Frame serialization failed");
                }
            }
        }
        let _ = ws_sink.close().await;
    });

    // Inbound pump: socket -> engine -> dispatcher
    let state_recv = state.clone();
    let conn_recv = conn.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    handle_text_frame(&state_recv, user_id, &conn_recv, &text).await;
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(connection = %conn_recv, "Client closed connection");
                    break;
                }
                Ok(Message::Binary(_)) => {
                    tracing::debug!(connection = %conn_recv, "Binary frames not supported");
                }
                Ok(_) => {} // Ping/Pong handled by axum
                Err(e) => {
                    tracing::debug!(connection = %conn_recv, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    }

    teardown(&state, &conn).await;
}

/// Parse and execute one inbound frame
async fn handle_text_frame(state: &AppState, user_id: Snowflake, conn: &ConnectionId, text: &str) {
    let envelope: ClientEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(connection = %conn, error = %e, "Unparseable frame, ignoring");
            return;
        }
    };

    let command = match ClientCommand::parse(envelope) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(connection = %conn, error = %e, "Rejected frame");
            return;
        }
    };

    let emissions = state.engine().handle(user_id, conn, command).await;
    state.dispatcher().deliver(emissions).await;
}

/// Disconnect teardown; safe to reach from any exit path
async fn teardown(state: &AppState, conn: &ConnectionId) {
    tracing::info!(connection = %conn, "Cleaning up connection");
    let emissions = state.engine().on_disconnect(conn).await;
    state.dispatcher().detach(conn);
    state.dispatcher().deliver(emissions).await;
}
