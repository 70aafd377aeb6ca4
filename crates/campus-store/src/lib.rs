//! # campus-store
//!
//! In-memory implementation of the `ChatStore` collaborator. The production
//! document store lives outside this system; this crate backs the server
//! binary in development and the test suite, and doubles as the reference
//! semantics for the trait.

mod memory;

pub use memory::MemoryStore;
