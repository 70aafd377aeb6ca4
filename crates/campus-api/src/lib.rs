//! # campus-api
//!
//! REST fallback surface. Socket-less clients use these endpoints for the
//! same operations the realtime gateway exposes; both paths share the
//! fan-out engine, so a REST send produces the identical broadcast.

pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;
