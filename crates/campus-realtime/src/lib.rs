//! # campus-realtime
//!
//! The realtime messaging and presence core: connection registry, chat-page
//! presence tracking, broadcast groups, room membership gate, message fan-out
//! engine, and targeted emission. The engine turns typed inbound commands
//! into lists of `(target, event, payload)` emissions; the frame dispatcher
//! resolves targets to live connections at delivery time. No transport
//! library appears anywhere in this crate.

pub mod commands;
pub mod connection;
pub mod dispatcher;
pub mod emitter;
pub mod engine;
pub mod events;
pub mod gate;
pub mod groups;
pub mod presence;
pub mod registry;

pub use commands::{ClientCommand, ClientEnvelope, CommandError};
pub use connection::ConnectionId;
pub use dispatcher::{FrameDispatcher, OutboundFrame};
pub use emitter::emit_to_user;
pub use engine::{FanoutEngine, FriendPresence};
pub use events::{EmitTarget, Emission, EventName};
pub use gate::RoomGate;
pub use groups::{BroadcastGroups, Group};
pub use presence::PresenceTracker;
pub use registry::ConnectionRegistry;
