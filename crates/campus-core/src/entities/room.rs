//! Room entity - a direct (2-party) or group conversation

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

/// Maximum number of participants in a group room
pub const MAX_GROUP_MEMBERS: usize = 100;

/// Length of generated group invite codes
const INVITE_CODE_LEN: usize = 8;

/// Room type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    /// Two-party conversation
    #[default]
    Direct,
    /// N-party conversation with admins and a creator
    Group,
}

/// Room entity
///
/// Direct rooms have exactly two participants, no name, no admins, and are
/// never hard-deleted. Group rooms carry a name, an invite code, an admin
/// subset of the participants, and a creator who alone may delete the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: Snowflake,
    pub room_type: RoomType,
    pub name: Option<String>,
    pub participants: Vec<Snowflake>,
    pub admins: Vec<Snowflake>,
    pub creator_id: Option<Snowflake>,
    pub invite_code: Option<String>,
    pub last_message_id: Option<Snowflake>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// Create a new direct room between two users
    #[must_use]
    pub fn new_direct(id: Snowflake, a: Snowflake, b: Snowflake) -> Self {
        let now = Utc::now();
        Self {
            id,
            room_type: RoomType::Direct,
            name: None,
            participants: vec![a, b],
            admins: Vec::new(),
            creator_id: None,
            invite_code: None,
            last_message_id: None,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new group room; the creator is the first participant and admin
    #[must_use]
    pub fn new_group(id: Snowflake, name: String, creator_id: Snowflake) -> Self {
        let now = Utc::now();
        Self {
            id,
            room_type: RoomType::Group,
            name: Some(name),
            participants: vec![creator_id],
            admins: vec![creator_id],
            creator_id: Some(creator_id),
            invite_code: Some(generate_invite_code()),
            last_message_id: None,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.room_type == RoomType::Direct
    }

    #[inline]
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.room_type == RoomType::Group
    }

    /// Check whether a user is a participant of this room
    #[must_use]
    pub fn has_participant(&self, user_id: Snowflake) -> bool {
        self.participants.contains(&user_id)
    }

    /// Check whether a user is an admin of this room
    #[must_use]
    pub fn is_admin(&self, user_id: Snowflake) -> bool {
        self.admins.contains(&user_id)
    }

    /// Check whether a user is the creator of this room
    #[must_use]
    pub fn is_creator(&self, user_id: Snowflake) -> bool {
        self.creator_id == Some(user_id)
    }

    /// The other participant of a direct room
    ///
    /// Returns `None` for group rooms or when the given user is not a
    /// participant.
    #[must_use]
    pub fn other_participant(&self, user_id: Snowflake) -> Option<Snowflake> {
        if !self.is_direct() || !self.has_participant(user_id) {
            return None;
        }
        self.participants.iter().copied().find(|&p| p != user_id)
    }

    /// Check whether the group has reached its member cap
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.is_group() && self.participants.len() >= MAX_GROUP_MEMBERS
    }

    /// Add a participant; no-op if already present
    pub fn add_participant(&mut self, user_id: Snowflake) {
        if !self.has_participant(user_id) {
            self.participants.push(user_id);
            self.updated_at = Utc::now();
        }
    }

    /// Remove a user from both `participants` and `admins`
    ///
    /// Both lists are stripped together so a user can never remain an admin
    /// of a room they are not a participant of.
    pub fn remove_participant(&mut self, user_id: Snowflake) {
        self.participants.retain(|&p| p != user_id);
        self.admins.retain(|&a| a != user_id);
        self.updated_at = Utc::now();
    }

    /// Promote a participant to admin; no-op if already an admin
    pub fn add_admin(&mut self, user_id: Snowflake) {
        if self.has_participant(user_id) && !self.is_admin(user_id) {
            self.admins.push(user_id);
            self.updated_at = Utc::now();
        }
    }

    /// Record the most recent message
    pub fn touch_last_message(&mut self, message_id: Snowflake, at: DateTime<Utc>) {
        self.last_message_id = Some(message_id);
        self.last_message_at = Some(at);
        self.updated_at = at;
    }
}

/// Generate a random alphanumeric invite code for a group room
#[must_use]
pub fn generate_invite_code() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
