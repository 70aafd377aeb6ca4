//! Conversation and message handlers
//!
//! The REST mirror of the socket messaging operations. Mutations run through
//! the same fan-out engine as the gateway, then hand the resulting emissions
//! to the dispatcher, so a socket-less send still reaches every live client.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use campus_core::MessageQuery;

use crate::dto::{
    ClearChatResponse, CreateDirectRequest, MarkReadRequest, MarkReadResponse, MessageResponse,
    RoomResponse, SendMessageRequest,
};
use crate::extractors::{AuthUser, ValidatedJson};
use crate::handlers::parse_id;
use crate::response::{ApiResult, Created, NoContent};
use crate::state::AppState;

/// Query parameters for message history
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Only messages older than this id
    pub before: Option<String>,
    pub limit: Option<i64>,
}

/// Get the caller's conversations
///
/// GET /conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<RoomResponse>>> {
    let rooms = state.engine().list_rooms(auth.user_id).await?;
    Ok(Json(rooms.iter().map(RoomResponse::from).collect()))
}

/// Get or create the direct conversation with another user
///
/// POST /conversations/direct
pub async fn create_direct(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateDirectRequest>,
) -> ApiResult<Response> {
    let (room, created, emissions) = state
        .engine()
        .create_direct(auth.user_id, request.user_id)
        .await?;
    state.dispatcher().deliver(emissions).await;

    let body = Json(RoomResponse::from(&room));
    if created {
        Ok(Created(body).into_response())
    } else {
        Ok(body.into_response())
    }
}

/// Get message history, newest first
///
/// GET /conversations/{room_id}/messages
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let room_id = parse_id(&room_id, "room_id")?;
    let before = params
        .before
        .as_deref()
        .map(|raw| parse_id(raw, "before cursor"))
        .transpose()?;

    let query = MessageQuery {
        before,
        limit: params.limit.unwrap_or(50).min(100),
    };
    let (room, messages) = state
        .engine()
        .message_history(auth.user_id, room_id, query)
        .await?;

    Ok(Json(
        messages
            .iter()
            .map(|m| MessageResponse::for_requester(m, &room, auth.user_id))
            .collect(),
    ))
}

/// Send a message without a live socket
///
/// POST /conversations/{room_id}/messages
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    ValidatedJson(request): ValidatedJson<SendMessageRequest>,
) -> ApiResult<Created<Json<MessageResponse>>> {
    let room_id = parse_id(&room_id, "room_id")?;

    let (message, emissions) = state
        .engine()
        .send_message(
            auth.user_id,
            None,
            room_id,
            request.content,
            request.message_type,
            request.file_url,
        )
        .await?;
    state.dispatcher().deliver(emissions).await;

    Ok(Created(Json(MessageResponse::freshly_sent(&message))))
}

/// Record read receipts
///
/// POST /conversations/{room_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    ValidatedJson(request): ValidatedJson<MarkReadRequest>,
) -> ApiResult<Json<MarkReadResponse>> {
    let room_id = parse_id(&room_id, "room_id")?;

    let (message_ids, emissions) = state
        .engine()
        .mark_read(auth.user_id, room_id, request.message_ids)
        .await?;
    state.dispatcher().deliver(emissions).await;

    Ok(Json(MarkReadResponse { room_id, message_ids }))
}

/// Soft-delete one message; sender only
///
/// DELETE /conversations/{room_id}/messages/{message_id}
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((room_id, message_id)): Path<(String, String)>,
) -> ApiResult<NoContent> {
    let room_id = parse_id(&room_id, "room_id")?;
    let message_id = parse_id(&message_id, "message_id")?;

    let emissions = state
        .engine()
        .delete_message(auth.user_id, room_id, message_id)
        .await?;
    state.dispatcher().deliver(emissions).await;

    Ok(NoContent)
}

/// Soft-clear a conversation's messages
///
/// DELETE /conversations/{room_id}/messages
pub async fn clear_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> ApiResult<Json<ClearChatResponse>> {
    let room_id = parse_id(&room_id, "room_id")?;

    let (cleared, emissions) = state.engine().clear_chat(auth.user_id, room_id).await?;
    state.dispatcher().deliver(emissions).await;

    Ok(Json(ClearChatResponse { room_id, cleared }))
}
