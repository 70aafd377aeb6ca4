//! Presence snapshot handler

use axum::{extract::State, Json};

use campus_realtime::FriendPresence;

use crate::extractors::AuthUser;
use crate::response::ApiResult;
use crate::state::AppState;

/// Presence snapshot for the caller's friends
///
/// The polling complement to the `user_on_chat_page` push events: each
/// friend's live connectivity, chat-page membership, and durable last-seen.
///
/// GET /online-users
pub async fn online_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<FriendPresence>>> {
    let snapshot = state.engine().friends_presence(auth.user_id).await?;
    Ok(Json(snapshot))
}
