//! # campus-gateway
//!
//! WebSocket transport for the realtime core, plus the server binary that
//! mounts it alongside the REST fallback router. The transport's whole job:
//! authenticate the handshake, turn inbound frames into typed commands, and
//! pump the engine's emissions back out through the frame dispatcher.

pub mod server;

pub use server::{build_state, create_app, gateway_handler};
