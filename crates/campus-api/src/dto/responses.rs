//! Response DTOs

use campus_core::{Message, MessageType, Room, RoomType, Snowflake};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A conversation as seen by the requesting user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResponse {
    pub id: Snowflake,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub name: Option<String>,
    pub participants: Vec<Snowflake>,
    pub admins: Vec<Snowflake>,
    pub creator_id: Option<Snowflake>,
    pub invite_code: Option<String>,
    pub last_message_id: Option<Snowflake>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Room> for RoomResponse {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            room_type: room.room_type,
            name: room.name.clone(),
            participants: room.participants.clone(),
            admins: room.admins.clone(),
            creator_id: room.creator_id,
            invite_code: room.invite_code.clone(),
            last_message_id: room.last_message_id,
            last_message_at: room.last_message_at,
            created_at: room.created_at,
        }
    }
}

impl From<Room> for RoomResponse {
    fn from(room: Room) -> Self {
        Self::from(&room)
    }
}

/// A message with the read flag computed for the requesting user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Snowflake,
    pub room_id: Snowflake,
    pub sender: Option<Snowflake>,
    pub content: String,
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageResponse {
    /// Shape a message for `requester`'s history view
    #[must_use]
    pub fn for_requester(message: &Message, room: &Room, requester: Snowflake) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            sender: message.sender_id,
            content: message.content.clone(),
            message_type: message.message_type,
            file_url: message.file_url.clone(),
            is_read: message.read_flag_for(room, requester),
            created_at: message.created_at,
        }
    }

    /// Shape a just-sent message; unread by definition
    #[must_use]
    pub fn freshly_sent(message: &Message) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            sender: message.sender_id,
            content: message.content.clone(),
            message_type: message.message_type,
            file_url: message.file_url.clone(),
            is_read: false,
            created_at: message.created_at,
        }
    }
}

/// Acknowledgement for a read-receipt batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub room_id: Snowflake,
    pub message_ids: Vec<Snowflake>,
}

/// Acknowledgement for a chat clear
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearChatResponse {
    pub room_id: Snowflake,
    pub cleared: u64,
}
