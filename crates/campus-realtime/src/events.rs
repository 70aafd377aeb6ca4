//! Outbound event names and emissions
//!
//! Every domain action resolves to a list of `Emission` values; the
//! transport layer delivers them without interpreting payloads. Event names
//! are part of the client contract and must not change.

use serde_json::Value;

use crate::connection::ConnectionId;
use crate::groups::Group;

/// Outbound event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    // Messaging
    MessageReceived,
    MessageSent,
    MessageError,
    MessagesRead,
    MessageDeleted,
    ChatCleared,

    // Typing
    UserTyping,
    UserStoppedTyping,

    // Connectivity
    UserOnline,
    UserOffline,

    // Chat-page presence
    UserOnChatPage,
    UserLeftChatPage,

    // Calls
    IncomingCall,
    IncomingGroupCall,
    CallAccepted,
    CallRejected,
    CallEnded,

    // Rooms and membership
    MemberJoined,
    MemberRemoved,
    MemberLeft,
    AdminAdded,
    ChannelCreated,
    ChannelDeleted,
    RoomUpdated,
    RoomDeleted,
}

impl EventName {
    /// Wire name of the event
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MessageReceived => "message_received",
            Self::MessageSent => "message_sent",
            Self::MessageError => "message_error",
            Self::MessagesRead => "messages_read",
            Self::MessageDeleted => "message_deleted",
            Self::ChatCleared => "chat_cleared",

            Self::UserTyping => "user_typing",
            Self::UserStoppedTyping => "user_stopped_typing",

            Self::UserOnline => "user_online",
            Self::UserOffline => "user_offline",

            Self::UserOnChatPage => "user_on_chat_page",
            Self::UserLeftChatPage => "user_left_chat_page",

            Self::IncomingCall => "incoming_call",
            Self::IncomingGroupCall => "incoming_group_call",
            Self::CallAccepted => "call_accepted",
            Self::CallRejected => "call_rejected",
            Self::CallEnded => "call_ended",

            Self::MemberJoined => "member_joined",
            Self::MemberRemoved => "member_removed",
            Self::MemberLeft => "member_left",
            Self::AdminAdded => "admin_added",
            Self::ChannelCreated => "channel_created",
            Self::ChannelDeleted => "channel_deleted",
            Self::RoomUpdated => "room_updated",
            Self::RoomDeleted => "room_deleted",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an emission should be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitTarget {
    /// A single live connection
    Connection(ConnectionId),
    /// Every connection in a broadcast group, minus an optional exclusion
    Group {
        group: Group,
        exclude: Option<ConnectionId>,
    },
    /// Every live connection except one (connect/disconnect announcements)
    AllExcept(ConnectionId),
}

/// One deliverable event: target, wire name, JSON payload
#[derive(Debug, Clone)]
pub struct Emission {
    pub target: EmitTarget,
    pub event: EventName,
    pub payload: Value,
}

impl Emission {
    /// Emission to a single connection
    #[must_use]
    pub fn to_connection(conn: ConnectionId, event: EventName, payload: Value) -> Self {
        Self {
            target: EmitTarget::Connection(conn),
            event,
            payload,
        }
    }

    /// Emission to a whole broadcast group
    #[must_use]
    pub fn to_group(group: Group, event: EventName, payload: Value) -> Self {
        Self {
            target: EmitTarget::Group {
                group,
                exclude: None,
            },
            event,
            payload,
        }
    }

    /// Emission to a broadcast group minus one connection
    #[must_use]
    pub fn to_group_except(
        group: Group,
        exclude: Option<ConnectionId>,
        event: EventName,
        payload: Value,
    ) -> Self {
        Self {
            target: EmitTarget::Group { group, exclude },
            event,
            payload,
        }
    }

    /// Emission to every connection except the given one
    #[must_use]
    pub fn to_all_except(conn: ConnectionId, event: EventName, payload: Value) -> Self {
        Self {
            target: EmitTarget::AllExcept(conn),
            event,
            payload,
        }
    }
}
