//! Message entity - a chat message belonging to exactly one room

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::Room;
use crate::value_objects::Snowflake;

/// Message type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    /// Synthesized membership announcement; always senderless
    System,
}

/// Message entity
///
/// `sender_id` is `None` only for system messages. `read_by` is the set of
/// user ids who have acknowledged the message; mutation is limited to
/// read-set union and the soft-delete flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Snowflake,
    pub room_id: Snowflake,
    pub sender_id: Option<Snowflake>,
    pub content: String,
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub read_by: Vec<Snowflake>,
    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new user-authored message with an empty read set
    #[must_use]
    pub fn new(
        id: Snowflake,
        room_id: Snowflake,
        sender_id: Snowflake,
        content: String,
        message_type: MessageType,
        file_url: Option<String>,
    ) -> Self {
        Self {
            id,
            room_id,
            sender_id: Some(sender_id),
            content,
            message_type,
            file_url,
            read_by: Vec::new(),
            deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    /// Create a system message announcing a membership change
    #[must_use]
    pub fn new_system(id: Snowflake, room_id: Snowflake, content: String) -> Self {
        Self {
            id,
            room_id,
            sender_id: None,
            content,
            message_type: MessageType::System,
            file_url: None,
            read_by: Vec::new(),
            deleted: false,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.message_type == MessageType::System
    }

    /// Check whether a user has acknowledged this message
    #[must_use]
    pub fn is_read_by(&self, user_id: Snowflake) -> bool {
        self.read_by.contains(&user_id)
    }

    /// Add a user to the read set; returns false if already present
    pub fn mark_read_by(&mut self, user_id: Snowflake) -> bool {
        if self.is_read_by(user_id) {
            return false;
        }
        self.read_by.push(user_id);
        true
    }

    /// Soft-delete: content is retained but excluded from future reads
    pub fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.deleted = true;
        self.deleted_at = Some(at);
    }

    /// Compute the read flag for a history fetch, from `requester`'s view.
    ///
    /// Direct rooms: a message the requester authored is read once the other
    /// participant acknowledged it; a message the other participant authored
    /// is read once the requester acknowledged it. Group rooms: always
    /// relative to the requester's own membership in the read set, regardless
    /// of authorship. System messages are read by construction.
    #[must_use]
    pub fn read_flag_for(&self, room: &Room, requester: Snowflake) -> bool {
        if self.is_system() {
            return true;
        }
        match room.room_type {
            crate::entities::RoomType::Direct => {
                if self.sender_id == Some(requester) {
                    room.other_participant(requester)
                        .is_some_and(|other| self.is_read_by(other))
                } else {
                    self.is_read_by(requester)
                }
            }
            crate::entities::RoomType::Group => self.is_read_by(requester),
        }
    }
}
