//! Connection registry
//!
//! Bidirectional mapping between user identity and the single live transport
//! connection for that user. Last-connect-wins: a new connection for a user
//! displaces the previous mapping. Both direction maps live behind one mutex
//! so they are mutual inverses at every quiescent point.

use parking_lot::Mutex;
use std::collections::HashMap;

use campus_core::Snowflake;

use crate::connection::ConnectionId;

#[derive(Default)]
struct RegistryInner {
    by_user: HashMap<Snowflake, ConnectionId>,
    by_connection: HashMap<ConnectionId, Snowflake>,
}

/// In-memory user <-> connection registry
///
/// Explicitly constructed and injected (no process-global state) so tests
/// build isolated instances. Critical sections are short and never await.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user, unconditionally
    ///
    /// Overwrites any prior mapping for either the user or the connection.
    /// Returns the displaced connection id when the user was already
    /// registered elsewhere.
    pub fn register(&self, user_id: Snowflake, conn: ConnectionId) -> Option<ConnectionId> {
        let mut inner = self.inner.lock();

        // The connection may have been registered to a different user
        if let Some(prior_user) = inner.by_connection.insert(conn.clone(), user_id) {
            if prior_user != user_id {
                inner.by_user.remove(&prior_user);
            }
        }

        let displaced = inner.by_user.insert(user_id, conn.clone());
        if let Some(old_conn) = &displaced {
            if *old_conn != conn {
                inner.by_connection.remove(old_conn);
            }
        }

        tracing::debug!(user_id = %user_id, connection = %conn, "Connection registered");
        displaced.filter(|old| *old != conn)
    }

    /// Look up the live connection for a user
    pub fn lookup(&self, user_id: Snowflake) -> Option<ConnectionId> {
        self.inner.lock().by_user.get(&user_id).cloned()
    }

    /// Look up the owning user of a connection
    pub fn user_for(&self, conn: &ConnectionId) -> Option<Snowflake> {
        self.inner.lock().by_connection.get(conn).copied()
    }

    /// Remove a connection from both directions
    ///
    /// Safe to call on an unknown id. Returns the owning user id only on the
    /// first removal, so disconnect teardown runs exactly once even when the
    /// transport fires its disconnect signal repeatedly.
    pub fn unregister(&self, conn: &ConnectionId) -> Option<Snowflake> {
        let mut inner = self.inner.lock();
        let user_id = inner.by_connection.remove(conn)?;

        // Only drop the forward mapping if it still points at this
        // connection; a newer register may already own it.
        if inner.by_user.get(&user_id) == Some(conn) {
            inner.by_user.remove(&user_id);
        }

        tracing::debug!(user_id = %user_id, connection = %conn, "Connection unregistered");
        Some(user_id)
    }

    /// Whether a user currently has a registered connection
    pub fn is_online(&self, user_id: Snowflake) -> bool {
        self.inner.lock().by_user.contains_key(&user_id)
    }

    /// All users with a registered connection
    pub fn online_users(&self) -> Vec<Snowflake> {
        self.inner.lock().by_user.keys().copied().collect()
    }

    /// Number of registered connections
    pub fn len(&self) -> usize {
        self.inner.lock().by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ConnectionRegistry")
            .field("users", &inner.by_user.len())
            .field("connections", &inner.by_connection.len())
            .finish()
    }
}
