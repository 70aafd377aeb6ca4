//! Domain entities

mod message;
mod room;

pub use message::{Message, MessageType};
pub use room::{generate_invite_code, Room, RoomType, MAX_GROUP_MEMBERS};
