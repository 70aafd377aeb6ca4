//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Room not found: {0}")]
    RoomNotFound(Snowflake),

    #[error("Message not found: {0}")]
    MessageNotFound(Snowflake),

    #[error("Invite code not found: {0}")]
    InviteNotFound(String),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Not a participant of room {0}")]
    NotParticipant(Snowflake),

    #[error("Not an admin of room {0}")]
    NotRoomAdmin(Snowflake),

    #[error("Not the creator of room {0}")]
    NotRoomCreator(Snowflake),

    #[error("Not the message sender")]
    NotMessageSender,

    // =========================================================================
    // Validation / Business Rules
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Group is full: max {max} members")]
    RoomFull { max: usize },

    #[error("Already a member of this room")]
    AlreadyMember,

    #[error("Cannot remove the group creator")]
    CannotRemoveCreator,

    #[error("Cannot start a conversation with yourself")]
    CannotMessageSelf,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get an error code string for error events and API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "UNKNOWN_ROOM",
            Self::MessageNotFound(_) => "UNKNOWN_MESSAGE",
            Self::InviteNotFound(_) => "UNKNOWN_INVITE",

            Self::NotParticipant(_) => "NOT_PARTICIPANT",
            Self::NotRoomAdmin(_) => "NOT_ROOM_ADMIN",
            Self::NotRoomCreator(_) => "NOT_ROOM_CREATOR",
            Self::NotMessageSender => "NOT_MESSAGE_SENDER",

            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::RoomFull { .. } => "ROOM_FULL",
            Self::AlreadyMember => "ALREADY_MEMBER",
            Self::CannotRemoveCreator => "CANNOT_REMOVE_CREATOR",
            Self::CannotMessageSelf => "CANNOT_MESSAGE_SELF",

            Self::StorageError(_) => "STORAGE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::RoomNotFound(_) | Self::MessageNotFound(_) | Self::InviteNotFound(_)
        )
    }

    /// Check if this is an authorization error
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::NotParticipant(_)
                | Self::NotRoomAdmin(_)
                | Self::NotRoomCreator(_)
                | Self::NotMessageSender
        )
    }

    /// Check if this is a validation or business-rule error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::RoomFull { .. }
                | Self::AlreadyMember
                | Self::CannotRemoveCreator
                | Self::CannotMessageSelf
        )
    }
}
