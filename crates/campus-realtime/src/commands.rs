//! Typed inbound commands
//!
//! Every inbound realtime frame is an envelope `{"event": ..., "data": ...}`.
//! The envelope is parsed into a typed command before any domain logic runs,
//! so the fan-out engine never sees transport-level JSON.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use campus_core::{MessageType, Snowflake};

/// Raw inbound frame
#[derive(Debug, Clone, Deserialize)]
pub struct ClientEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Envelope parsing errors
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Invalid payload for {event}: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A validated inbound command
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    JoinChannel { channel: String },
    LeaveChannel { channel: String },
    JoinGroup { group: String },
    LeaveGroup { group: String },

    ChatPageEnter,
    ChatPageLeave,

    JoinRooms { room_ids: Vec<Snowflake> },
    JoinRoom { room_id: Snowflake },
    LeaveRoom { room_id: Snowflake },

    TypingStart { room_id: Snowflake },
    TypingStop { room_id: Snowflake },

    SendMessage {
        room_id: Snowflake,
        content: String,
        message_type: MessageType,
        file_url: Option<String>,
    },

    /// Read-receipt batch; ids stay raw strings so malformed entries can be
    /// filtered defensively instead of failing the whole batch
    MarkRead {
        room_id: Snowflake,
        message_ids: Vec<String>,
    },

    CallUser { to: Snowflake, payload: Value },
    CallGroup { room_id: Snowflake, payload: Value },
    CallAccepted { to: Snowflake, payload: Value },
    CallRejected { to: Snowflake, payload: Value },
    CallEnded { to: Snowflake, payload: Value },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelData {
    channel_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudyGroupData {
    group_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomData {
    room_id: Snowflake,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomsData {
    room_ids: Vec<Snowflake>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageData {
    room_id: Snowflake,
    content: String,
    #[serde(default)]
    message_type: MessageType,
    #[serde(default)]
    file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadData {
    room_id: Snowflake,
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserCallData {
    to: Snowflake,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupCallData {
    room_id: Snowflake,
    #[serde(default)]
    payload: Value,
}

fn payload<T: serde::de::DeserializeOwned>(event: &str, data: Value) -> Result<T, CommandError> {
    serde_json::from_value(data).map_err(|source| CommandError::InvalidPayload {
        event: event.to_string(),
        source,
    })
}

impl ClientCommand {
    /// Parse an inbound envelope into a typed command
    pub fn parse(envelope: ClientEnvelope) -> Result<Self, CommandError> {
        let ClientEnvelope { event, data } = envelope;
        match event.as_str() {
            "join_channel" => {
                let d: ChannelData = payload(&event, data)?;
                Ok(Self::JoinChannel { channel: d.channel_id })
            }
            "leave_channel" => {
                let d: ChannelData = payload(&event, data)?;
                Ok(Self::LeaveChannel { channel: d.channel_id })
            }
            "join_group" => {
                let d: StudyGroupData = payload(&event, data)?;
                Ok(Self::JoinGroup { group: d.group_id })
            }
            "leave_group" => {
                let d: StudyGroupData = payload(&event, data)?;
                Ok(Self::LeaveGroup { group: d.group_id })
            }
            "chat_page_enter" => Ok(Self::ChatPageEnter),
            "chat_page_leave" => Ok(Self::ChatPageLeave),
            "join_rooms" => {
                let d: RoomsData = payload(&event, data)?;
                Ok(Self::JoinRooms { room_ids: d.room_ids })
            }
            "join_room" => {
                let d: RoomData = payload(&event, data)?;
                Ok(Self::JoinRoom { room_id: d.room_id })
            }
            "leave_room" => {
                let d: RoomData = payload(&event, data)?;
                Ok(Self::LeaveRoom { room_id: d.room_id })
            }
            "typing_start" => {
                let d: RoomData = payload(&event, data)?;
                Ok(Self::TypingStart { room_id: d.room_id })
            }
            "typing_stop" => {
                let d: RoomData = payload(&event, data)?;
                Ok(Self::TypingStop { room_id: d.room_id })
            }
            "send_message" => {
                let d: SendMessageData = payload(&event, data)?;
                Ok(Self::SendMessage {
                    room_id: d.room_id,
                    content: d.content,
                    message_type: d.message_type,
                    file_url: d.file_url,
                })
            }
            "mark_read" => {
                let d: MarkReadData = payload(&event, data)?;
                Ok(Self::MarkRead {
                    room_id: d.room_id,
                    message_ids: d.message_ids,
                })
            }
            "call_user" => {
                let d: UserCallData = payload(&event, data)?;
                Ok(Self::CallUser { to: d.to, payload: d.payload })
            }
            "call_group" => {
                let d: GroupCallData = payload(&event, data)?;
                Ok(Self::CallGroup { room_id: d.room_id, payload: d.payload })
            }
            "call_accepted" => {
                let d: UserCallData = payload(&event, data)?;
                Ok(Self::CallAccepted { to: d.to, payload: d.payload })
            }
            "call_rejected" => {
                let d: UserCallData = payload(&event, data)?;
                Ok(Self::CallRejected { to: d.to, payload: d.payload })
            }
            "call_ended" => {
                let d: UserCallData = payload(&event, data)?;
                Ok(Self::CallEnded { to: d.to, payload: d.payload })
            }
            _ => Err(CommandError::UnknownEvent(event)),
        }
    }
}
