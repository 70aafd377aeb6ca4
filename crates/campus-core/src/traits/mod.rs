//! Storage collaborator trait (port) - defines the interface for data access

mod store;

pub use store::{ChatStore, MessageQuery, StoreResult};
