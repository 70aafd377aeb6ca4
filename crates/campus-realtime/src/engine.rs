//! Message fan-out engine
//!
//! Executes domain actions against the storage collaborator and computes the
//! emission set for the transport to deliver. Storage writes are awaited
//! before their broadcast is built, so a client can never receive a message
//! reference that a subsequent read query cannot find.

use serde_json::{json, Value};
use std::sync::Arc;

use campus_core::{
    ChatStore, DomainError, Message, MessageQuery, MessageType, Room, Snowflake,
    SnowflakeGenerator,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::commands::ClientCommand;
use crate::connection::ConnectionId;
use crate::emitter::emit_to_user;
use crate::events::{Emission, EventName};
use crate::gate::RoomGate;
use crate::groups::{BroadcastGroups, Group};
use crate::presence::PresenceTracker;
use crate::registry::ConnectionRegistry;

/// One friend's presence snapshot (the polling complement to push events)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendPresence {
    pub user_id: Snowflake,
    pub online: bool,
    pub on_chat_page: bool,
    pub last_seen: Option<chrono::DateTime<Utc>>,
}

/// Wire shape of a message carried in `message_received`
pub fn message_payload(message: &Message, is_read: bool) -> Value {
    json!({
        "id": message.id,
        "roomId": message.room_id,
        "sender": message.sender_id,
        "content": message.content,
        "messageType": message.message_type,
        "fileUrl": message.file_url,
        "isRead": is_read,
        "createdAt": message.created_at.to_rfc3339(),
    })
}

/// Wire shape of a room carried in room lifecycle events
pub fn room_payload(room: &Room) -> Value {
    json!({
        "id": room.id,
        "type": room.room_type,
        "name": room.name,
        "participants": room.participants,
        "admins": room.admins,
        "creatorId": room.creator_id,
        "inviteCode": room.invite_code,
        "lastMessageId": room.last_message_id,
        "lastMessageAt": room.last_message_at.map(|t| t.to_rfc3339()),
        "createdAt": room.created_at.to_rfc3339(),
    })
}

/// The realtime core's command processor
pub struct FanoutEngine {
    store: Arc<dyn ChatStore>,
    gate: RoomGate,
    registry: Arc<ConnectionRegistry>,
    presence: Arc<PresenceTracker>,
    groups: Arc<BroadcastGroups>,
    ids: SnowflakeGenerator,
}

impl FanoutEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn ChatStore>,
        registry: Arc<ConnectionRegistry>,
        presence: Arc<PresenceTracker>,
        groups: Arc<BroadcastGroups>,
        worker_id: u16,
    ) -> Self {
        Self {
            gate: RoomGate::new(store.clone()),
            store,
            registry,
            presence,
            groups,
            ids: SnowflakeGenerator::new(worker_id),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn groups(&self) -> &BroadcastGroups {
        &self.groups
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Register an authenticated connection
    ///
    /// Joins the connection to its user fallback group and announces
    /// `user_online` to everyone else. Returns the displaced connection id
    /// when a previous connection for the user existed (last-connect-wins).
    pub fn on_connect(
        &self,
        user_id: Snowflake,
        conn: &ConnectionId,
    ) -> (Vec<Emission>, Option<ConnectionId>) {
        let displaced = self.registry.register(user_id, conn.clone());
        self.groups.join(conn, Group::user(user_id));

        info!(user_id = %user_id, connection = %conn, "User connected");

        let emissions = vec![Emission::to_all_except(
            conn.clone(),
            EventName::UserOnline,
            json!({ "userId": user_id }),
        )];
        (emissions, displaced)
    }

    /// Tear down a connection; idempotent
    ///
    /// A disconnect is an implicit, unconditional chat-page leave plus
    /// registry teardown. The registry yields the owning user only on the
    /// first call, so a transport firing its disconnect signal twice cannot
    /// double-broadcast `user_offline`. The durable last-seen update is
    /// best-effort: failure is logged, never surfaced.
    pub async fn on_disconnect(&self, conn: &ConnectionId) -> Vec<Emission> {
        let Some(user_id) = self.registry.unregister(conn) else {
            self.groups.leave_all(conn);
            debug!(connection = %conn, "Disconnect for unregistered connection, nothing to do");
            return Vec::new();
        };

        let mut emissions = self.presence.leave(user_id, &self.registry);
        self.groups.leave_all(conn);

        let now = Utc::now();
        emissions.push(Emission::to_all_except(
            conn.clone(),
            EventName::UserOffline,
            json!({ "userId": user_id, "lastSeen": now.to_rfc3339() }),
        ));

        if let Err(e) = self.store.update_user_last_seen(user_id, now).await {
            warn!(user_id = %user_id, error = %e, "Failed to persist last-seen, continuing");
        }

        info!(user_id = %user_id, connection = %conn, "User disconnected");
        emissions
    }

    // =========================================================================
    // Command dispatch
    // =========================================================================

    /// Process one inbound command from a live connection
    ///
    /// Authorization and not-found failures on mutating actions come back as
    /// a `message_error` emission to the commanding connection only; they are
    /// never broadcast.
    pub async fn handle(
        &self,
        actor: Snowflake,
        conn: &ConnectionId,
        command: ClientCommand,
    ) -> Vec<Emission> {
        match command {
            ClientCommand::JoinChannel { channel } => {
                self.groups.join(conn, Group::Channel(channel));
                Vec::new()
            }
            ClientCommand::LeaveChannel { channel } => {
                self.groups.leave(conn, &Group::Channel(channel));
                Vec::new()
            }
            ClientCommand::JoinGroup { group } => {
                self.groups.join(conn, Group::StudyGroup(group));
                Vec::new()
            }
            ClientCommand::LeaveGroup { group } => {
                self.groups.leave(conn, &Group::StudyGroup(group));
                Vec::new()
            }
            ClientCommand::ChatPageEnter => self.presence.enter(actor, &self.registry),
            ClientCommand::ChatPageLeave => self.presence.leave(actor, &self.registry),
            ClientCommand::JoinRooms { room_ids } => {
                for room_id in room_ids {
                    self.join_room(actor, conn, room_id).await;
                }
                Vec::new()
            }
            ClientCommand::JoinRoom { room_id } => {
                self.join_room(actor, conn, room_id).await;
                Vec::new()
            }
            ClientCommand::LeaveRoom { room_id } => {
                self.groups.leave(conn, &Group::room(room_id));
                Vec::new()
            }
            ClientCommand::TypingStart { room_id } => {
                self.typing(actor, conn, room_id, true).await
            }
            ClientCommand::TypingStop { room_id } => {
                self.typing(actor, conn, room_id, false).await
            }
            ClientCommand::SendMessage {
                room_id,
                content,
                message_type,
                file_url,
            } => {
                match self
                    .send_message(actor, Some(conn), room_id, content, message_type, file_url)
                    .await
                {
                    Ok((_, emissions)) => emissions,
                    Err(e) => vec![error_emission(conn, &e)],
                }
            }
            ClientCommand::MarkRead { room_id, message_ids } => {
                match self.mark_read(actor, room_id, message_ids).await {
                    Ok((_, emissions)) => emissions,
                    Err(e) => vec![error_emission(conn, &e)],
                }
            }
            ClientCommand::CallUser { to, payload } => {
                vec![emit_to_user(
                    &self.registry,
                    to,
                    EventName::IncomingCall,
                    json!({ "from": actor, "payload": payload }),
                )]
            }
            ClientCommand::CallGroup { room_id, payload } => {
                match self.gate.authorize(actor, room_id).await {
                    Ok(_) => vec![Emission::to_group_except(
                        Group::room(room_id),
                        Some(conn.clone()),
                        EventName::IncomingGroupCall,
                        json!({ "roomId": room_id, "from": actor, "payload": payload }),
                    )],
                    Err(e) => vec![error_emission(conn, &e)],
                }
            }
            ClientCommand::CallAccepted { to, payload } => {
                vec![emit_to_user(
                    &self.registry,
                    to,
                    EventName::CallAccepted,
                    json!({ "from": actor, "payload": payload }),
                )]
            }
            ClientCommand::CallRejected { to, payload } => {
                vec![emit_to_user(
                    &self.registry,
                    to,
                    EventName::CallRejected,
                    json!({ "from": actor, "payload": payload }),
                )]
            }
            ClientCommand::CallEnded { to, payload } => {
                vec![emit_to_user(
                    &self.registry,
                    to,
                    EventName::CallEnded,
                    json!({ "from": actor, "payload": payload }),
                )]
            }
        }
    }

    /// Subscribe a connection to a room's broadcast group, membership-gated
    async fn join_room(&self, actor: Snowflake, conn: &ConnectionId, room_id: Snowflake) {
        match self.gate.authorize(actor, room_id).await {
            Ok(_) => self.groups.join(conn, Group::room(room_id)),
            Err(e) => {
                debug!(user_id = %actor, room_id = %room_id, error = %e, "Room join refused");
            }
        }
    }

    // =========================================================================
    // Messaging
    // =========================================================================

    /// Persist and fan out a message
    ///
    /// `via` is the commanding connection for the socket path; the REST
    /// fallback passes `None` and uses its response body as the send
    /// acknowledgement. The broadcast payload always carries `isRead: false`
    /// regardless of room type - no recipient has read it at send time.
    #[instrument(skip(self, content, file_url))]
    pub async fn send_message(
        &self,
        actor: Snowflake,
        via: Option<&ConnectionId>,
        room_id: Snowflake,
        content: String,
        message_type: MessageType,
        file_url: Option<String>,
    ) -> Result<(Message, Vec<Emission>), DomainError> {
        self.gate.authorize(actor, room_id).await?;

        if content.trim().is_empty() && file_url.is_none() {
            return Err(DomainError::ValidationError(
                "Message content cannot be empty".into(),
            ));
        }

        let message = Message::new(
            self.ids.generate(),
            room_id,
            actor,
            content,
            message_type,
            file_url,
        );
        self.store.create_message(&message).await?;
        self.store
            .update_room_last_message(room_id, message.id, message.created_at)
            .await?;

        info!(message_id = %message.id, room_id = %room_id, "Message sent");

        let mut emissions = vec![Emission::to_group(
            Group::room(room_id),
            EventName::MessageReceived,
            message_payload(&message, false),
        )];
        if let Some(conn) = via {
            emissions.push(Emission::to_connection(
                conn.clone(),
                EventName::MessageSent,
                json!({ "messageId": message.id, "roomId": room_id }),
            ));
        }

        Ok((message, emissions))
    }

    /// Record read receipts and notify the interested parties
    ///
    /// Malformed ids are filtered silently; the store additionally drops ids
    /// of system messages and of messages outside the room. The notification
    /// is the room-type asymmetry of the read model: a direct room's receipt
    /// goes to the one other participant via targeted emission, a group
    /// room's receipt is broadcast to the room minus the reader.
    #[instrument(skip(self, raw_message_ids))]
    pub async fn mark_read(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
        raw_message_ids: Vec<String>,
    ) -> Result<(Vec<Snowflake>, Vec<Emission>), DomainError> {
        let room = self.gate.authorize(actor, room_id).await?;

        let message_ids: Vec<Snowflake> = raw_message_ids
            .iter()
            .filter_map(|raw| match raw.parse::<Snowflake>() {
                Ok(id) => Some(id),
                Err(_) => {
                    debug!(raw_id = %raw, "Dropping malformed message id");
                    None
                }
            })
            .collect();

        if message_ids.is_empty() {
            return Ok((message_ids, Vec::new()));
        }

        let updated = self
            .store
            .mark_messages_read(room_id, &message_ids, actor)
            .await?;
        debug!(room_id = %room_id, updated = updated, "Read receipts recorded");

        let payload = json!({
            "roomId": room_id,
            "messageIds": message_ids,
            "readBy": actor,
        });

        let emissions = if room.is_direct() {
            // Only the one other party's read state matters
            room.other_participant(actor)
                .map(|other| {
                    vec![emit_to_user(
                        &self.registry,
                        other,
                        EventName::MessagesRead,
                        payload,
                    )]
                })
                .unwrap_or_default()
        } else {
            vec![Emission::to_group_except(
                Group::room(room_id),
                self.registry.lookup(actor),
                EventName::MessagesRead,
                payload,
            )]
        };

        Ok((message_ids, emissions))
    }

    /// Soft-delete a message; sender only
    #[instrument(skip(self))]
    pub async fn delete_message(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
        message_id: Snowflake,
    ) -> Result<Vec<Emission>, DomainError> {
        self.gate.authorize(actor, room_id).await?;

        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or(DomainError::MessageNotFound(message_id))?;

        if message.room_id != room_id {
            return Err(DomainError::MessageNotFound(message_id));
        }
        if message.sender_id != Some(actor) {
            return Err(DomainError::NotMessageSender);
        }

        self.store
            .soft_delete_message(message_id, Utc::now())
            .await?;

        info!(message_id = %message_id, "Message soft-deleted");

        Ok(vec![Emission::to_group(
            Group::room(message.room_id),
            EventName::MessageDeleted,
            json!({ "messageId": message_id, "roomId": message.room_id }),
        )])
    }

    /// Typing indicator passthrough, membership-gated per event
    async fn typing(
        &self,
        actor: Snowflake,
        conn: &ConnectionId,
        room_id: Snowflake,
        started: bool,
    ) -> Vec<Emission> {
        if let Err(e) = self.gate.authorize(actor, room_id).await {
            debug!(user_id = %actor, room_id = %room_id, error = %e, "Typing event refused");
            return Vec::new();
        }
        let event = if started {
            EventName::UserTyping
        } else {
            EventName::UserStoppedTyping
        };
        vec![Emission::to_group_except(
            Group::room(room_id),
            Some(conn.clone()),
            event,
            json!({ "roomId": room_id, "userId": actor }),
        )]
    }

    // =========================================================================
    // History and listings (REST surface)
    // =========================================================================

    /// Authorize and fetch a room's message history, newest first
    pub async fn message_history(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
        query: MessageQuery,
    ) -> Result<(Room, Vec<Message>), DomainError> {
        let room = self.gate.authorize(actor, room_id).await?;
        let messages = self.store.find_messages(room_id, query).await?;
        Ok((room, messages))
    }

    /// The actor's conversations, most recent activity first
    pub async fn list_rooms(&self, actor: Snowflake) -> Result<Vec<Room>, DomainError> {
        self.store.find_rooms_for_user(actor).await
    }

    /// Presence snapshot for the actor's friends
    pub async fn friends_presence(
        &self,
        actor: Snowflake,
    ) -> Result<Vec<FriendPresence>, DomainError> {
        let friend_ids = self.store.get_friend_ids(actor).await?;
        let mut snapshot = Vec::with_capacity(friend_ids.len());
        for friend_id in friend_ids {
            snapshot.push(FriendPresence {
                user_id: friend_id,
                online: self.registry.is_online(friend_id),
                on_chat_page: self.presence.is_on_page(friend_id),
                last_seen: self.store.get_user_last_seen(friend_id).await?,
            });
        }
        Ok(snapshot)
    }

    // =========================================================================
    // Room lifecycle
    // =========================================================================

    /// Get or create the direct room with a peer
    ///
    /// Returns the room and whether it was created by this call.
    #[instrument(skip(self))]
    pub async fn create_direct(
        &self,
        actor: Snowflake,
        peer: Snowflake,
    ) -> Result<(Room, bool, Vec<Emission>), DomainError> {
        if actor == peer {
            return Err(DomainError::CannotMessageSelf);
        }

        if let Some(existing) = self.store.find_direct_room(actor, peer).await? {
            return Ok((existing, false, Vec::new()));
        }

        let room = Room::new_direct(self.ids.generate(), actor, peer);
        self.store.create_room(&room).await?;

        info!(room_id = %room.id, "Direct room created");

        let emissions = vec![emit_to_user(
            &self.registry,
            peer,
            EventName::ChannelCreated,
            room_payload(&room),
        )];
        Ok((room, true, emissions))
    }

    /// Create a group room; the creator becomes participant and admin
    #[instrument(skip(self, name, member_ids))]
    pub async fn create_group(
        &self,
        actor: Snowflake,
        name: String,
        member_ids: Vec<Snowflake>,
    ) -> Result<(Room, Vec<Emission>), DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Group name cannot be empty".into(),
            ));
        }

        let mut room = Room::new_group(self.ids.generate(), name, actor);
        for member in member_ids {
            if room.is_full() {
                return Err(DomainError::RoomFull {
                    max: campus_core::MAX_GROUP_MEMBERS,
                });
            }
            room.add_participant(member);
        }
        self.store.create_room(&room).await?;

        let who = self.display_name(actor).await;
        let (_, announcement) = self
            .announce(room.id, format!("{who} created the group"))
            .await?;

        info!(room_id = %room.id, members = room.participants.len(), "Group created");

        // New members are not yet subscribed to the room group, so the
        // lifecycle event goes to each of them individually.
        let mut emissions: Vec<Emission> = room
            .participants
            .iter()
            .map(|&member| {
                emit_to_user(
                    &self.registry,
                    member,
                    EventName::ChannelCreated,
                    room_payload(&room),
                )
            })
            .collect();
        emissions.push(announcement);

        // Re-read so the returned room carries the last-message pointer
        let room = self
            .store
            .find_room(room.id)
            .await?
            .ok_or(DomainError::RoomNotFound(room.id))?;
        Ok((room, emissions))
    }

    /// Join a group via its invite code
    #[instrument(skip(self, code))]
    pub async fn join_by_invite(
        &self,
        actor: Snowflake,
        code: &str,
    ) -> Result<(Room, Vec<Emission>), DomainError> {
        let mut room = self
            .store
            .find_room_by_invite(code)
            .await?
            .ok_or_else(|| DomainError::InviteNotFound(code.to_string()))?;

        if room.has_participant(actor) {
            return Err(DomainError::AlreadyMember);
        }
        if room.is_full() {
            return Err(DomainError::RoomFull {
                max: campus_core::MAX_GROUP_MEMBERS,
            });
        }

        room.add_participant(actor);
        self.store.update_room(&room).await?;

        let who = self.display_name(actor).await;
        let (_, announcement) = self
            .announce(room.id, format!("{who} joined the group"))
            .await?;

        info!(room_id = %room.id, user_id = %actor, "Joined group by invite");

        let membership = json!({ "roomId": room.id, "userId": actor });
        let emissions = vec![
            Emission::to_group(Group::room(room.id), EventName::MemberJoined, membership.clone()),
            announcement,
            // The joiner is not in the room group yet
            emit_to_user(&self.registry, actor, EventName::MemberJoined, membership),
        ];

        let room = self
            .store
            .find_room(room.id)
            .await?
            .ok_or(DomainError::RoomNotFound(room.id))?;
        Ok((room, emissions))
    }

    /// Add a member to a group; admin only
    #[instrument(skip(self))]
    pub async fn add_member(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Vec<Emission>, DomainError> {
        let mut room = self.require_group_admin(actor, room_id).await?;

        if room.has_participant(user_id) {
            return Err(DomainError::AlreadyMember);
        }
        if room.is_full() {
            return Err(DomainError::RoomFull {
                max: campus_core::MAX_GROUP_MEMBERS,
            });
        }

        room.add_participant(user_id);
        self.store.update_room(&room).await?;

        let who = self.display_name(user_id).await;
        let (_, announcement) = self
            .announce(room_id, format!("{who} was added to the group"))
            .await?;

        info!(room_id = %room_id, user_id = %user_id, added_by = %actor, "Member added");

        let membership = json!({ "roomId": room_id, "userId": user_id, "addedBy": actor });
        Ok(vec![
            Emission::to_group(Group::room(room_id), EventName::MemberJoined, membership.clone()),
            announcement,
            emit_to_user(&self.registry, user_id, EventName::MemberJoined, membership),
        ])
    }

    /// Remove a member from a group; admin only, creator is irremovable
    #[instrument(skip(self))]
    pub async fn remove_member(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Vec<Emission>, DomainError> {
        let mut room = self.require_group_admin(actor, room_id).await?;

        if !room.has_participant(user_id) {
            return Err(DomainError::NotParticipant(room_id));
        }
        if room.is_creator(user_id) {
            return Err(DomainError::CannotRemoveCreator);
        }

        // Participants and admins are stripped together in one update
        room.remove_participant(user_id);
        self.store.update_room(&room).await?;

        let who = self.display_name(user_id).await;
        let (_, announcement) = self
            .announce(room_id, format!("{who} was removed from the group"))
            .await?;

        // The room-group subscription is the access boundary: drop the
        // removed user's connection from the broadcast group now.
        if let Some(conn) = self.registry.lookup(user_id) {
            self.groups.leave(&conn, &Group::room(room_id));
        }

        info!(room_id = %room_id, user_id = %user_id, removed_by = %actor, "Member removed");

        let membership = json!({ "roomId": room_id, "userId": user_id, "removedBy": actor });
        Ok(vec![
            Emission::to_group(Group::room(room_id), EventName::MemberRemoved, membership.clone()),
            announcement,
            emit_to_user(&self.registry, user_id, EventName::MemberRemoved, membership),
        ])
    }

    /// Leave a group voluntarily
    #[instrument(skip(self))]
    pub async fn leave_group(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
    ) -> Result<Vec<Emission>, DomainError> {
        let mut room = self.gate.authorize(actor, room_id).await?;
        if !room.is_group() {
            return Err(DomainError::ValidationError(
                "Direct conversations cannot be left".into(),
            ));
        }

        room.remove_participant(actor);
        self.store.update_room(&room).await?;

        let who = self.display_name(actor).await;
        let (_, announcement) = self
            .announce(room_id, format!("{who} left the group"))
            .await?;

        if let Some(conn) = self.registry.lookup(actor) {
            self.groups.leave(&conn, &Group::room(room_id));
        }

        info!(room_id = %room_id, user_id = %actor, "Member left");

        Ok(vec![
            Emission::to_group(
                Group::room(room_id),
                EventName::MemberLeft,
                json!({ "roomId": room_id, "userId": actor }),
            ),
            announcement,
        ])
    }

    /// Promote a participant to admin; admin only
    #[instrument(skip(self))]
    pub async fn promote_admin(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
        user_id: Snowflake,
    ) -> Result<Vec<Emission>, DomainError> {
        let mut room = self.require_group_admin(actor, room_id).await?;

        if !room.has_participant(user_id) {
            return Err(DomainError::NotParticipant(room_id));
        }
        if room.is_admin(user_id) {
            return Err(DomainError::ValidationError("Already an admin".into()));
        }

        room.add_admin(user_id);
        self.store.update_room(&room).await?;

        let who = self.display_name(user_id).await;
        let (_, announcement) = self
            .announce(room_id, format!("{who} is now an admin"))
            .await?;

        info!(room_id = %room_id, user_id = %user_id, promoted_by = %actor, "Admin added");

        Ok(vec![
            Emission::to_group(
                Group::room(room_id),
                EventName::AdminAdded,
                json!({ "roomId": room_id, "userId": user_id, "promotedBy": actor }),
            ),
            announcement,
        ])
    }

    /// Rename a group; admin only
    #[instrument(skip(self, name))]
    pub async fn rename_group(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
        name: String,
    ) -> Result<(Room, Vec<Emission>), DomainError> {
        let mut room = self.require_group_admin(actor, room_id).await?;

        if name.trim().is_empty() {
            return Err(DomainError::ValidationError(
                "Group name cannot be empty".into(),
            ));
        }

        room.name = Some(name);
        room.updated_at = Utc::now();
        self.store.update_room(&room).await?;

        info!(room_id = %room_id, "Group renamed");

        let emissions = vec![Emission::to_group(
            Group::room(room_id),
            EventName::RoomUpdated,
            room_payload(&room),
        )];
        Ok((room, emissions))
    }

    /// Delete a group and its message history; creator only
    #[instrument(skip(self))]
    pub async fn delete_group(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
    ) -> Result<Vec<Emission>, DomainError> {
        let room = self.gate.authorize_creator(actor, room_id).await?;
        if !room.is_group() {
            return Err(DomainError::ValidationError(
                "Direct conversations cannot be deleted".into(),
            ));
        }

        self.store.delete_room(room_id).await?;

        info!(room_id = %room_id, "Group deleted");

        let payload = json!({ "roomId": room_id });
        let mut emissions = vec![Emission::to_group(
            Group::room(room_id),
            EventName::RoomDeleted,
            payload.clone(),
        )];
        // Members without a live room subscription still learn the room is gone
        for &member in &room.participants {
            if member != actor {
                emissions.push(emit_to_user(
                    &self.registry,
                    member,
                    EventName::ChannelDeleted,
                    payload.clone(),
                ));
            }
        }
        Ok(emissions)
    }

    /// Soft-clear a room's messages
    #[instrument(skip(self))]
    pub async fn clear_chat(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
    ) -> Result<(u64, Vec<Emission>), DomainError> {
        self.gate.authorize(actor, room_id).await?;
        let cleared = self.store.clear_room_messages(room_id).await?;

        info!(room_id = %room_id, cleared = cleared, "Chat cleared");

        let emissions = vec![Emission::to_group(
            Group::room(room_id),
            EventName::ChatCleared,
            json!({ "roomId": room_id, "clearedBy": actor }),
        )];
        Ok((cleared, emissions))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn require_group_admin(
        &self,
        actor: Snowflake,
        room_id: Snowflake,
    ) -> Result<Room, DomainError> {
        let room = self.gate.authorize_admin(actor, room_id).await?;
        if !room.is_group() {
            return Err(DomainError::ValidationError(
                "Not a group conversation".into(),
            ));
        }
        Ok(room)
    }

    /// Persist a system message and advance the room's last-message pointer
    async fn announce(
        &self,
        room_id: Snowflake,
        text: String,
    ) -> Result<(Message, Emission), DomainError> {
        let message = Message::new_system(self.ids.generate(), room_id, text);
        self.store.create_message(&message).await?;
        self.store
            .update_room_last_message(room_id, message.id, message.created_at)
            .await?;

        let emission = Emission::to_group(
            Group::room(room_id),
            EventName::MessageReceived,
            message_payload(&message, true),
        );
        Ok((message, emission))
    }

    async fn display_name(&self, user_id: Snowflake) -> String {
        match self.store.get_display_name(user_id).await {
            Ok(Some(name)) => name,
            Ok(None) => user_id.to_string(),
            Err(e) => {
                debug!(user_id = %user_id, error = %e, "Display name lookup failed");
                user_id.to_string()
            }
        }
    }
}

fn error_emission(conn: &ConnectionId, error: &DomainError) -> Emission {
    Emission::to_connection(
        conn.clone(),
        EventName::MessageError,
        json!({ "code": error.code(), "message": error.to_string() }),
    )
}

impl std::fmt::Debug for FanoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutEngine")
            .field("registry", &self.registry)
            .field("presence", &self.presence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EmitTarget;
    use campus_store::MemoryStore;

    fn conn(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    fn setup() -> (Arc<MemoryStore>, FanoutEngine) {
        let store = Arc::new(MemoryStore::new());
        let engine = FanoutEngine::new(
            store.clone(),
            Arc::new(ConnectionRegistry::new()),
            Arc::new(PresenceTracker::new()),
            Arc::new(BroadcastGroups::new()),
            0,
        );
        (store, engine)
    }

    async fn seed_direct(store: &MemoryStore, a: Snowflake, b: Snowflake) -> Room {
        let room = Room::new_direct(Snowflake::new(100), a, b);
        store.create_room(&room).await.unwrap();
        room
    }

    async fn seed_group(store: &MemoryStore, creator: Snowflake, members: &[Snowflake]) -> Room {
        let mut room = Room::new_group(Snowflake::new(200), "study".into(), creator);
        for &m in members {
            room.add_participant(m);
        }
        store.create_room(&room).await.unwrap();
        room
    }

    fn named<'a>(emissions: &'a [Emission], event: EventName) -> Vec<&'a Emission> {
        emissions.iter().filter(|e| e.event == event).collect()
    }

    #[tokio::test]
    async fn test_send_broadcasts_unread_and_acks_sender() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_direct(&store, a, b).await;

        let (message, emissions) = engine
            .send_message(a, Some(&conn("ca")), room.id, "hi".into(), MessageType::Text, None)
            .await
            .unwrap();

        let received = named(&emissions, EventName::MessageReceived);
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].target,
            EmitTarget::Group { group: Group::room(room.id), exclude: None }
        );
        // Stable invariant: the broadcast copy is unread at send time
        assert_eq!(received[0].payload["isRead"], json!(false));

        let sent = named(&emissions, EventName::MessageSent);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, EmitTarget::Connection(conn("ca")));
        assert_eq!(sent[0].payload["messageId"], json!(message.id));

        // The room pointer advanced with the persisted write
        let room = store.find_room(room.id).await.unwrap().unwrap();
        assert_eq!(room.last_message_id, Some(message.id));
    }

    #[tokio::test]
    async fn test_send_from_non_participant_is_error_only() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let outsider = Snowflake::new(3);
        let room = seed_direct(&store, a, b).await;

        let emissions = engine
            .handle(
                outsider,
                &conn("cx"),
                ClientCommand::SendMessage {
                    room_id: room.id,
                    content: "let me in".into(),
                    message_type: MessageType::Text,
                    file_url: None,
                },
            )
            .await;

        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].event, EventName::MessageError);
        assert_eq!(emissions[0].target, EmitTarget::Connection(conn("cx")));
        assert_eq!(emissions[0].payload["code"], json!("NOT_PARTICIPANT"));
        // Nothing persisted, nothing broadcast
        assert_eq!(store.message_count(room.id), 0);
    }

    #[tokio::test]
    async fn test_direct_read_receipt_targets_sender_only() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_direct(&store, a, b).await;
        engine.registry().register(a, conn("ca"));

        let (message, _) = engine
            .send_message(a, None, room.id, "hi".into(), MessageType::Text, None)
            .await
            .unwrap();

        // Until B acknowledges, A's view of the message is unread
        let stored = store.find_message(message.id).await.unwrap().unwrap();
        assert!(!stored.read_flag_for(&room, a));

        let (kept, emissions) = engine
            .mark_read(b, room.id, vec![message.id.to_string()])
            .await
            .unwrap();
        assert_eq!(kept, vec![message.id]);

        // Exactly one targeted emission to A's connection, never room-wide
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].event, EventName::MessagesRead);
        assert_eq!(emissions[0].target, EmitTarget::Connection(conn("ca")));

        let stored = store.find_message(message.id).await.unwrap().unwrap();
        assert!(stored.read_flag_for(&room, a));
    }

    #[tokio::test]
    async fn test_group_read_receipt_broadcasts_except_reader() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let c = Snowflake::new(3);
        let room = seed_group(&store, a, &[b, c]).await;
        engine.registry().register(b, conn("cb"));

        let (message, _) = engine
            .send_message(a, None, room.id, "hi all".into(), MessageType::Text, None)
            .await
            .unwrap();

        let (_, emissions) = engine
            .mark_read(b, room.id, vec![message.id.to_string()])
            .await
            .unwrap();

        assert_eq!(emissions.len(), 1);
        assert_eq!(
            emissions[0].target,
            EmitTarget::Group {
                group: Group::room(room.id),
                exclude: Some(conn("cb")),
            }
        );

        // B's receipt must not change C's computed view
        let stored = store.find_message(message.id).await.unwrap().unwrap();
        assert!(stored.read_flag_for(&room, b));
        assert!(!stored.read_flag_for(&room, c));
    }

    #[tokio::test]
    async fn test_mark_read_filters_malformed_ids() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_direct(&store, a, b).await;

        let (message, _) = engine
            .send_message(a, None, room.id, "hi".into(), MessageType::Text, None)
            .await
            .unwrap();

        let (kept, _) = engine
            .mark_read(
                b,
                room.id,
                vec![message.id.to_string(), "not-an-id".into(), String::new()],
            )
            .await
            .unwrap();
        assert_eq!(kept, vec![message.id]);

        // A batch of only malformed ids is a silent no-op
        let (kept, emissions) = engine
            .mark_read(b, room.id, vec!["$oops".into()])
            .await
            .unwrap();
        assert!(kept.is_empty());
        assert!(emissions.is_empty());
    }

    #[tokio::test]
    async fn test_delete_message_requires_sender() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_direct(&store, a, b).await;

        let (message, _) = engine
            .send_message(a, None, room.id, "hi".into(), MessageType::Text, None)
            .await
            .unwrap();

        assert!(matches!(
            engine.delete_message(b, room.id, message.id).await,
            Err(DomainError::NotMessageSender)
        ));

        let emissions = engine.delete_message(a, room.id, message.id).await.unwrap();
        assert_eq!(emissions[0].event, EventName::MessageDeleted);
        let stored = store.find_message(message.id).await.unwrap().unwrap();
        assert!(stored.deleted);
    }

    #[tokio::test]
    async fn test_removal_strips_admin_with_participation() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_group(&store, a, &[b]).await;

        engine.promote_admin(a, room.id, b).await.unwrap();
        let stored = store.find_room(room.id).await.unwrap().unwrap();
        assert!(stored.is_admin(b));

        engine.remove_member(a, room.id, b).await.unwrap();
        let stored = store.find_room(room.id).await.unwrap().unwrap();
        assert!(!stored.has_participant(b));
        assert!(!stored.is_admin(b));
    }

    #[tokio::test]
    async fn test_leaving_strips_admin_with_participation() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_group(&store, a, &[b]).await;
        engine.promote_admin(a, room.id, b).await.unwrap();

        engine.leave_group(b, room.id).await.unwrap();
        let stored = store.find_room(room.id).await.unwrap().unwrap();
        assert!(!stored.has_participant(b));
        assert!(!stored.is_admin(b));
    }

    #[tokio::test]
    async fn test_remove_member_unsubscribes_connection() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_group(&store, a, &[b]).await;

        engine.registry().register(b, conn("cb"));
        engine.groups().join(&conn("cb"), Group::room(room.id));

        engine.remove_member(a, room.id, b).await.unwrap();
        assert!(!engine.groups().contains(&Group::room(room.id), &conn("cb")));
    }

    #[tokio::test]
    async fn test_join_by_invite_announces_system_message() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_group(&store, a, &[]).await;
        store.set_display_name(b, "Jordan");
        let code = room.invite_code.clone().unwrap();

        let (joined, emissions) = engine.join_by_invite(b, &code).await.unwrap();
        assert!(joined.has_participant(b));

        assert_eq!(named(&emissions, EventName::MemberJoined).len(), 2);
        let system = named(&emissions, EventName::MessageReceived);
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].payload["messageType"], json!("system"));
        assert_eq!(system[0].payload["sender"], json!(null));
        assert_eq!(system[0].payload["isRead"], json!(true));
        assert_eq!(system[0].payload["content"], json!("Jordan joined the group"));

        // The announcement advanced the last-message pointer
        assert_eq!(joined.last_message_id.map(|id| json!(id)), Some(system[0].payload["id"].clone()));

        // Joining twice is refused
        assert!(matches!(
            engine.join_by_invite(b, &code).await,
            Err(DomainError::AlreadyMember)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_teardown_is_idempotent() {
        let (_store, engine) = setup();
        let a = Snowflake::new(1);

        let (emissions, displaced) = engine.on_connect(a, &conn("ca"));
        assert!(displaced.is_none());
        assert_eq!(emissions[0].event, EventName::UserOnline);

        let first = engine.on_disconnect(&conn("ca")).await;
        assert_eq!(named(&first, EventName::UserOffline).len(), 1);
        assert!(!engine.registry().is_online(a));

        let second = engine.on_disconnect(&conn("ca")).await;
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_displaces_and_stale_disconnect_is_quiet() {
        let (_store, engine) = setup();
        let a = Snowflake::new(1);

        engine.on_connect(a, &conn("old"));
        let (_, displaced) = engine.on_connect(a, &conn("new"));
        assert_eq!(displaced, Some(conn("old")));

        // The superseded socket's late disconnect must not announce offline
        let emissions = engine.on_disconnect(&conn("old")).await;
        assert!(named(&emissions, EventName::UserOffline).is_empty());
        assert!(engine.registry().is_online(a));
    }

    #[tokio::test]
    async fn test_create_direct_dedupes() {
        let (_store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);

        let (room, created, _) = engine.create_direct(a, b).await.unwrap();
        assert!(created);

        let (again, created, emissions) = engine.create_direct(b, a).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, room.id);
        assert!(emissions.is_empty());

        assert!(matches!(
            engine.create_direct(a, a).await,
            Err(DomainError::CannotMessageSelf)
        ));
    }

    #[tokio::test]
    async fn test_delete_group_is_creator_only() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_group(&store, a, &[b]).await;

        assert!(matches!(
            engine.delete_group(b, room.id).await,
            Err(DomainError::NotRoomCreator(_))
        ));

        let emissions = engine.delete_group(a, room.id).await.unwrap();
        assert_eq!(named(&emissions, EventName::RoomDeleted).len(), 1);
        assert_eq!(named(&emissions, EventName::ChannelDeleted).len(), 1);
        assert!(store.find_room(room.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_typing_is_gated_and_excludes_typist() {
        let (store, engine) = setup();
        let a = Snowflake::new(1);
        let b = Snowflake::new(2);
        let room = seed_direct(&store, a, b).await;

        let emissions = engine
            .handle(a, &conn("ca"), ClientCommand::TypingStart { room_id: room.id })
            .await;
        assert_eq!(emissions.len(), 1);
        assert_eq!(emissions[0].event, EventName::UserTyping);
        assert_eq!(
            emissions[0].target,
            EmitTarget::Group {
                group: Group::room(room.id),
                exclude: Some(conn("ca")),
            }
        );

        // Non-participant typing is dropped without an error event
        let emissions = engine
            .handle(
                Snowflake::new(9),
                &conn("cx"),
                ClientCommand::TypingStart { room_id: room.id },
            )
            .await;
        assert!(emissions.is_empty());
    }
}
