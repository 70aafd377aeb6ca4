//! Storage collaborator trait
//!
//! The persistent document store for rooms, messages, and user metadata is an
//! external collaborator; the realtime core consumes it through this trait
//! and never caches what it reads. Every authorization check re-reads current
//! room state through `find_room`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{Message, Room};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, DomainError>;

/// Pagination options for message history queries
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    /// Only messages with an id strictly below this one
    pub before: Option<Snowflake>,
    pub limit: i64,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    // =========================================================================
    // Rooms
    // =========================================================================

    /// Find a room by ID
    async fn find_room(&self, room_id: Snowflake) -> StoreResult<Option<Room>>;

    /// List all rooms a user participates in
    async fn find_rooms_for_user(&self, user_id: Snowflake) -> StoreResult<Vec<Room>>;

    /// Find the direct room between two users
    async fn find_direct_room(&self, a: Snowflake, b: Snowflake) -> StoreResult<Option<Room>>;

    /// Find a group room by invite code
    async fn find_room_by_invite(&self, code: &str) -> StoreResult<Option<Room>>;

    /// Create a new room
    async fn create_room(&self, room: &Room) -> StoreResult<()>;

    /// Replace a room document in full
    ///
    /// Membership mutations go through this so `participants` and `admins`
    /// change in a single persisted update.
    async fn update_room(&self, room: &Room) -> StoreResult<()>;

    /// Hard-delete a group room, cascading deletion of its messages
    async fn delete_room(&self, room_id: Snowflake) -> StoreResult<()>;

    /// Update a room's last-message pointer and activity timestamp
    async fn update_room_last_message(
        &self,
        room_id: Snowflake,
        message_id: Snowflake,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    // =========================================================================
    // Messages
    // =========================================================================

    /// Find a message by ID
    async fn find_message(&self, message_id: Snowflake) -> StoreResult<Option<Message>>;

    /// Persist a new message
    async fn create_message(&self, message: &Message) -> StoreResult<()>;

    /// List a room's messages, newest first, excluding soft-deleted ones
    async fn find_messages(
        &self,
        room_id: Snowflake,
        query: MessageQuery,
    ) -> StoreResult<Vec<Message>>;

    /// Add `user_id` to the read set of the given messages, idempotently
    ///
    /// Ids that do not exist or belong to a different room are ignored.
    /// Returns the number of messages actually updated.
    async fn mark_messages_read(
        &self,
        room_id: Snowflake,
        message_ids: &[Snowflake],
        user_id: Snowflake,
    ) -> StoreResult<u64>;

    /// Flip the soft-delete flag on a message
    async fn soft_delete_message(
        &self,
        message_id: Snowflake,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Soft-delete every message in a room; returns the number affected
    async fn clear_room_messages(&self, room_id: Snowflake) -> StoreResult<u64>;

    // =========================================================================
    // User metadata
    // =========================================================================

    /// Durable last-seen timestamp; callers treat failures as best-effort
    async fn update_user_last_seen(
        &self,
        user_id: Snowflake,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Read back a user's last-seen timestamp
    async fn get_user_last_seen(&self, user_id: Snowflake)
        -> StoreResult<Option<DateTime<Utc>>>;

    /// The requesting user's friend ids (friend-graph itself is external)
    async fn get_friend_ids(&self, user_id: Snowflake) -> StoreResult<Vec<Snowflake>>;

    /// Display name for system-message rendering; `None` falls back to the id
    async fn get_display_name(&self, user_id: Snowflake) -> StoreResult<Option<String>>;
}
