//! Request and response DTOs

mod requests;
mod responses;

pub use requests::{
    AddMemberRequest, CreateDirectRequest, CreateGroupRequest, MarkReadRequest,
    PromoteAdminRequest, SendMessageRequest, UpdateRoomRequest,
};
pub use responses::{ClearChatResponse, MarkReadResponse, MessageResponse, RoomResponse};
