//! Chat-page presence tracker
//!
//! Tracks which users are actively on the messaging surface, which is
//! distinct from merely having a socket connected. Enter and leave compute
//! their full notification set while holding the presence lock, so the
//! bilateral sync is atomic with the membership change and enter/leave pairs
//! for one user can never interleave.

use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashSet;

use campus_core::Snowflake;

use crate::events::{Emission, EventName};
use crate::registry::ConnectionRegistry;

/// Set of users currently on the chat page
#[derive(Default)]
pub struct PresenceTracker {
    on_page: Mutex<HashSet<Snowflake>>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a user as on the chat page
    ///
    /// Idempotent: re-entering produces no emissions. Otherwise the newcomer
    /// is told about everyone already present, and everyone already present
    /// is told about the newcomer - the transport offers no "who's here"
    /// query, so this push sync is the only way a client learns the roster.
    /// A member without a registered connection is skipped, never an error.
    pub fn enter(&self, user_id: Snowflake, registry: &ConnectionRegistry) -> Vec<Emission> {
        let mut on_page = self.on_page.lock();
        if !on_page.insert(user_id) {
            tracing::debug!(user_id = %user_id, "Already on chat page");
            return Vec::new();
        }

        let mut emissions = Vec::new();
        let own_conn = registry.lookup(user_id);

        for &other in on_page.iter().filter(|&&u| u != user_id) {
            match registry.lookup(other) {
                Some(conn) => emissions.push(Emission::to_connection(
                    conn,
                    EventName::UserOnChatPage,
                    json!({ "userId": user_id }),
                )),
                None => {
                    tracing::debug!(user_id = %other, "No live connection for presence sync, skipping");
                }
            }

            if let Some(conn) = &own_conn {
                emissions.push(Emission::to_connection(
                    conn.clone(),
                    EventName::UserOnChatPage,
                    json!({ "userId": other }),
                ));
            }
        }

        tracing::debug!(
            user_id = %user_id,
            peers = on_page.len() - 1,
            "Entered chat page"
        );
        emissions
    }

    /// Mark a user as off the chat page
    ///
    /// Idempotent: leaving while not present produces no emissions.
    pub fn leave(&self, user_id: Snowflake, registry: &ConnectionRegistry) -> Vec<Emission> {
        let mut on_page = self.on_page.lock();
        if !on_page.remove(&user_id) {
            tracing::debug!(user_id = %user_id, "Not on chat page");
            return Vec::new();
        }

        let mut emissions = Vec::new();
        for &other in on_page.iter() {
            match registry.lookup(other) {
                Some(conn) => emissions.push(Emission::to_connection(
                    conn,
                    EventName::UserLeftChatPage,
                    json!({ "userId": user_id }),
                )),
                None => {
                    tracing::debug!(user_id = %other, "No live connection for presence sync, skipping");
                }
            }
        }

        tracing::debug!(user_id = %user_id, "Left chat page");
        emissions
    }

    /// Whether a user is currently on the chat page
    pub fn is_on_page(&self, user_id: Snowflake) -> bool {
        self.on_page.lock().contains(&user_id)
    }

    /// Number of users on the chat page
    pub fn len(&self) -> usize {
        self.on_page.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.on_page.lock().is_empty()
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("on_page", &self.on_page.lock().len())
            .finish()
    }
}
