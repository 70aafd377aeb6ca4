//! Route definitions

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::handlers::{conversations, groups, health, presence};
use crate::state::AppState;

/// Create the REST router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(conversation_routes())
        .merge(group_routes())
        .route("/online-users", get(presence::online_users))
        .route("/health", get(health::health_check))
}

/// Conversation and message routes
fn conversation_routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations/direct", post(conversations::create_direct))
        .route(
            "/conversations/:room_id/messages",
            get(conversations::get_messages)
                .post(conversations::send_message)
                .delete(conversations::clear_chat),
        )
        .route(
            "/conversations/:room_id/messages/:message_id",
            delete(conversations::delete_message),
        )
        .route("/conversations/:room_id/read", post(conversations::mark_read))
}

/// Group lifecycle and membership routes
fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/conversations/group", post(groups::create_group))
        .route("/conversations/join/:code", post(groups::join_by_invite))
        .route(
            "/conversations/:room_id",
            patch(groups::update_room).delete(groups::delete_group),
        )
        .route("/conversations/:room_id/members", post(groups::add_member))
        .route(
            "/conversations/:room_id/members/:user_id",
            delete(groups::remove_member),
        )
        .route("/conversations/:room_id/leave", post(groups::leave_group))
        .route("/conversations/:room_id/admins", post(groups::promote_admin))
}
