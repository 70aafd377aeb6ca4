//! Integration test utilities for the campus realtime server
//!
//! Provides helpers for running end-to-end tests against the REST surface
//! and the WebSocket gateway, with an isolated in-memory store per server.

pub mod helpers;

pub use helpers::*;
