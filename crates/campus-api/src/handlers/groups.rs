//! Group lifecycle and member management handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::dto::{
    AddMemberRequest, CreateGroupRequest, PromoteAdminRequest, RoomResponse, UpdateRoomRequest,
};
use crate::extractors::{AuthUser, ValidatedJson};
use crate::handlers::parse_id;
use crate::response::{ApiResult, Created, NoContent};
use crate::state::AppState;

/// Create a group conversation
///
/// POST /conversations/group
pub async fn create_group(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateGroupRequest>,
) -> ApiResult<Created<Json<RoomResponse>>> {
    let (room, emissions) = state
        .engine()
        .create_group(auth.user_id, request.name, request.member_ids)
        .await?;
    state.dispatcher().deliver(emissions).await;

    Ok(Created(Json(RoomResponse::from(&room))))
}

/// Join a group via invite code
///
/// POST /conversations/join/{code}
pub async fn join_by_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(code): Path<String>,
) -> ApiResult<Json<RoomResponse>> {
    let (room, emissions) = state.engine().join_by_invite(auth.user_id, &code).await?;
    state.dispatcher().deliver(emissions).await;

    Ok(Json(RoomResponse::from(&room)))
}

/// Add a member to a group; admin only
///
/// POST /conversations/{room_id}/members
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    ValidatedJson(request): ValidatedJson<AddMemberRequest>,
) -> ApiResult<NoContent> {
    let room_id = parse_id(&room_id, "room_id")?;

    let emissions = state
        .engine()
        .add_member(auth.user_id, room_id, request.user_id)
        .await?;
    state.dispatcher().deliver(emissions).await;

    Ok(NoContent)
}

/// Remove a member from a group; admin only
///
/// DELETE /conversations/{room_id}/members/{user_id}
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((room_id, user_id)): Path<(String, String)>,
) -> ApiResult<NoContent> {
    let room_id = parse_id(&room_id, "room_id")?;
    let user_id = parse_id(&user_id, "user_id")?;

    let emissions = state
        .engine()
        .remove_member(auth.user_id, room_id, user_id)
        .await?;
    state.dispatcher().deliver(emissions).await;

    Ok(NoContent)
}

/// Leave a group
///
/// POST /conversations/{room_id}/leave
pub async fn leave_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> ApiResult<NoContent> {
    let room_id = parse_id(&room_id, "room_id")?;

    let emissions = state.engine().leave_group(auth.user_id, room_id).await?;
    state.dispatcher().deliver(emissions).await;

    Ok(NoContent)
}

/// Promote a participant to admin; admin only
///
/// POST /conversations/{room_id}/admins
pub async fn promote_admin(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    ValidatedJson(request): ValidatedJson<PromoteAdminRequest>,
) -> ApiResult<NoContent> {
    let room_id = parse_id(&room_id, "room_id")?;

    let emissions = state
        .engine()
        .promote_admin(auth.user_id, room_id, request.user_id)
        .await?;
    state.dispatcher().deliver(emissions).await;

    Ok(NoContent)
}

/// Rename a group; admin only
///
/// PATCH /conversations/{room_id}
pub async fn update_room(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateRoomRequest>,
) -> ApiResult<Json<RoomResponse>> {
    let room_id = parse_id(&room_id, "room_id")?;

    let (room, emissions) = state
        .engine()
        .rename_group(auth.user_id, room_id, request.name)
        .await?;
    state.dispatcher().deliver(emissions).await;

    Ok(Json(RoomResponse::from(&room)))
}

/// Delete a group and its history; creator only
///
/// DELETE /conversations/{room_id}
pub async fn delete_group(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(room_id): Path<String>,
) -> ApiResult<NoContent> {
    let room_id = parse_id(&room_id, "room_id")?;

    let emissions = state.engine().delete_group(auth.user_id, room_id).await?;
    state.dispatcher().deliver(emissions).await;

    Ok(NoContent)
}
