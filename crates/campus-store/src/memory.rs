//! In-memory chat store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use campus_core::{
    ChatStore, DomainError, Message, MessageQuery, Room, Snowflake, StoreResult,
};

/// Default page size when a query passes a non-positive limit
const DEFAULT_PAGE_SIZE: i64 = 50;

/// DashMap-backed `ChatStore`
///
/// Rooms and messages are kept whole-document, mirroring how the external
/// document store is used: membership mutations replace the room document in
/// one update.
#[derive(Default)]
pub struct MemoryStore {
    rooms: DashMap<Snowflake, Room>,
    messages: DashMap<Snowflake, Message>,
    last_seen: DashMap<Snowflake, DateTime<Utc>>,
    friends: DashMap<Snowflake, Vec<Snowflake>>,
    display_names: DashMap<Snowflake, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's friend list (the friend graph itself is external)
    pub fn set_friends(&self, user_id: Snowflake, friends: Vec<Snowflake>) {
        self.friends.insert(user_id, friends);
    }

    /// Seed a display name for system-message rendering
    pub fn set_display_name(&self, user_id: Snowflake, name: impl Into<String>) {
        self.display_names.insert(user_id, name.into());
    }

    /// Number of non-deleted messages in a room (test helper)
    pub fn message_count(&self, room_id: Snowflake) -> usize {
        self.messages
            .iter()
            .filter(|m| m.room_id == room_id && !m.deleted)
            .count()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn find_room(&self, room_id: Snowflake) -> StoreResult<Option<Room>> {
        Ok(self.rooms.get(&room_id).map(|r| r.clone()))
    }

    async fn find_rooms_for_user(&self, user_id: Snowflake) -> StoreResult<Vec<Room>> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter(|r| r.has_participant(user_id))
            .map(|r| r.clone())
            .collect();
        // Most recent activity first
        rooms.sort_by(|a, b| {
            b.last_message_at
                .unwrap_or(b.created_at)
                .cmp(&a.last_message_at.unwrap_or(a.created_at))
        });
        Ok(rooms)
    }

    async fn find_direct_room(&self, a: Snowflake, b: Snowflake) -> StoreResult<Option<Room>> {
        Ok(self
            .rooms
            .iter()
            .find(|r| r.is_direct() && r.has_participant(a) && r.has_participant(b))
            .map(|r| r.clone()))
    }

    async fn find_room_by_invite(&self, code: &str) -> StoreResult<Option<Room>> {
        Ok(self
            .rooms
            .iter()
            .find(|r| r.invite_code.as_deref() == Some(code))
            .map(|r| r.clone()))
    }

    async fn create_room(&self, room: &Room) -> StoreResult<()> {
        self.rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn update_room(&self, room: &Room) -> StoreResult<()> {
        if !self.rooms.contains_key(&room.id) {
            return Err(DomainError::RoomNotFound(room.id));
        }
        self.rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn delete_room(&self, room_id: Snowflake) -> StoreResult<()> {
        self.rooms
            .remove(&room_id)
            .ok_or(DomainError::RoomNotFound(room_id))?;
        // Cascade: group deletion takes the message history with it
        self.messages.retain(|_, m| m.room_id != room_id);
        Ok(())
    }

    async fn update_room_last_message(
        &self,
        room_id: Snowflake,
        message_id: Snowflake,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(DomainError::RoomNotFound(room_id))?;
        room.touch_last_message(message_id, at);
        Ok(())
    }

    async fn find_message(&self, message_id: Snowflake) -> StoreResult<Option<Message>> {
        Ok(self.messages.get(&message_id).map(|m| m.clone()))
    }

    async fn create_message(&self, message: &Message) -> StoreResult<()> {
        self.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn find_messages(
        &self,
        room_id: Snowflake,
        query: MessageQuery,
    ) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.room_id == room_id && !m.deleted)
            .filter(|m| query.before.is_none_or(|before| m.id < before))
            .map(|m| m.clone())
            .collect();
        messages.sort_by(|a, b| b.id.cmp(&a.id));

        let limit = if query.limit > 0 {
            query.limit as usize
        } else {
            DEFAULT_PAGE_SIZE as usize
        };
        messages.truncate(limit);
        Ok(messages)
    }

    async fn mark_messages_read(
        &self,
        room_id: Snowflake,
        message_ids: &[Snowflake],
        user_id: Snowflake,
    ) -> StoreResult<u64> {
        let mut updated = 0;
        for id in message_ids {
            let Some(mut message) = self.messages.get_mut(id) else {
                continue;
            };
            // Ids from other rooms and system messages are dropped silently
            if message.room_id != room_id || message.is_system() {
                continue;
            }
            if message.mark_read_by(user_id) {
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn soft_delete_message(
        &self,
        message_id: Snowflake,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut message = self
            .messages
            .get_mut(&message_id)
            .ok_or(DomainError::MessageNotFound(message_id))?;
        message.soft_delete(at);
        Ok(())
    }

    async fn clear_room_messages(&self, room_id: Snowflake) -> StoreResult<u64> {
        let now = Utc::now();
        let mut cleared = 0;
        for mut entry in self.messages.iter_mut() {
            if entry.room_id == room_id && !entry.deleted {
                entry.soft_delete(now);
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn update_user_last_seen(
        &self,
        user_id: Snowflake,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.last_seen.insert(user_id, at);
        Ok(())
    }

    async fn get_user_last_seen(
        &self,
        user_id: Snowflake,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.last_seen.get(&user_id).map(|t| *t))
    }

    async fn get_friend_ids(&self, user_id: Snowflake) -> StoreResult<Vec<Snowflake>> {
        Ok(self.friends.get(&user_id).map(|f| f.clone()).unwrap_or_default())
    }

    async fn get_display_name(&self, user_id: Snowflake) -> StoreResult<Option<String>> {
        Ok(self.display_names.get(&user_id).map(|n| n.clone()))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("rooms", &self.rooms.len())
            .field("messages", &self.messages.len())
            .finish()
    }
}
