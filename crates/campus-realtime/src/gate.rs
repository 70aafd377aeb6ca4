//! Room membership gate
//!
//! Loads the room and checks the actor against its participant list. The
//! check runs on every room-scoped operation; membership is never cached
//! across actions in a session, because participants can change between a
//! client's actions (removal racing a send).

use std::sync::Arc;

use campus_core::{ChatStore, DomainError, Room, Snowflake};

/// Per-operation room authorization
#[derive(Clone)]
pub struct RoomGate {
    store: Arc<dyn ChatStore>,
}

impl RoomGate {
    #[must_use]
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Load the room and require the actor to be a participant
    pub async fn authorize(
        &self,
        user_id: Snowflake,
        room_id: Snowflake,
    ) -> Result<Room, DomainError> {
        let room = self
            .store
            .find_room(room_id)
            .await?
            .ok_or(DomainError::RoomNotFound(room_id))?;

        if !room.has_participant(user_id) {
            return Err(DomainError::NotParticipant(room_id));
        }

        Ok(room)
    }

    /// Require the actor to be a participant and an admin
    pub async fn authorize_admin(
        &self,
        user_id: Snowflake,
        room_id: Snowflake,
    ) -> Result<Room, DomainError> {
        let room = self.authorize(user_id, room_id).await?;
        if !room.is_admin(user_id) {
            return Err(DomainError::NotRoomAdmin(room_id));
        }
        Ok(room)
    }

    /// Require the actor to be the room's creator
    pub async fn authorize_creator(
        &self,
        user_id: Snowflake,
        room_id: Snowflake,
    ) -> Result<Room, DomainError> {
        let room = self.authorize(user_id, room_id).await?;
        if !room.is_creator(user_id) {
            return Err(DomainError::NotRoomCreator(room_id));
        }
        Ok(room)
    }
}

impl std::fmt::Debug for RoomGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomGate").finish()
    }
}
