//! Request DTOs with validation rules

use campus_core::{MessageType, Snowflake};
use serde::Deserialize;
use validator::Validate;

/// POST /conversations/direct
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDirectRequest {
    pub user_id: Snowflake,
}

/// POST /conversations/group
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<Snowflake>,
}

/// POST /conversations/{room_id}/messages
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[validate(length(max = 4000, message = "Message content too long"))]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub file_url: Option<String>,
}

/// POST /conversations/{room_id}/read
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    /// Raw ids; malformed entries are filtered, not rejected
    #[serde(default)]
    pub message_ids: Vec<String>,
}

/// POST /conversations/{room_id}/members
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Snowflake,
}

/// POST /conversations/{room_id}/admins
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PromoteAdminRequest {
    pub user_id: Snowflake,
}

/// PATCH /conversations/{room_id}
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: String,
}
