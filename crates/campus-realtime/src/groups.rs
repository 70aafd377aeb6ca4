//! Broadcast groups
//!
//! Named sets of connections used for room-scoped fan-out, the per-user
//! fallback group, and campus channel/study-group surfaces. A reverse index
//! from connection to joined groups makes whole-connection cleanup on
//! disconnect a single call.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;

use campus_core::Snowflake;

use crate::connection::ConnectionId;

/// Broadcast group key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Group {
    /// A conversation's broadcast group
    Room(Snowflake),
    /// Per-user addressable group; every connection auto-joins its own on
    /// authentication (fallback target for registry misses)
    User(Snowflake),
    /// Named campus channel
    Channel(String),
    /// Study-group space
    StudyGroup(String),
}

impl Group {
    #[must_use]
    pub fn room(room_id: Snowflake) -> Self {
        Self::Room(room_id)
    }

    #[must_use]
    pub fn user(user_id: Snowflake) -> Self {
        Self::User(user_id)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room(id) => write!(f, "room:{id}"),
            Self::User(id) => write!(f, "user:{id}"),
            Self::Channel(name) => write!(f, "channel:{name}"),
            Self::StudyGroup(name) => write!(f, "study-group:{name}"),
        }
    }
}

#[derive(Default)]
struct GroupsInner {
    members: HashMap<Group, HashSet<ConnectionId>>,
    joined: HashMap<ConnectionId, HashSet<Group>>,
}

/// Connection membership in broadcast groups
#[derive(Default)]
pub struct BroadcastGroups {
    inner: Mutex<GroupsInner>,
}

impl BroadcastGroups {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a group; idempotent
    pub fn join(&self, conn: &ConnectionId, group: Group) {
        let mut inner = self.inner.lock();
        inner
            .members
            .entry(group.clone())
            .or_default()
            .insert(conn.clone());
        inner
            .joined
            .entry(conn.clone())
            .or_default()
            .insert(group.clone());
        tracing::trace!(connection = %conn, group = %group, "Joined broadcast group");
    }

    /// Remove a connection from a group; no-op when absent
    pub fn leave(&self, conn: &ConnectionId, group: &Group) {
        let mut inner = self.inner.lock();
        if let Some(members) = inner.members.get_mut(group) {
            members.remove(conn);
            if members.is_empty() {
                inner.members.remove(group);
            }
        }
        if let Some(groups) = inner.joined.get_mut(conn) {
            groups.remove(group);
            if groups.is_empty() {
                inner.joined.remove(conn);
            }
        }
        tracing::trace!(connection = %conn, group = %group, "Left broadcast group");
    }

    /// Remove a connection from every group it joined
    ///
    /// Returns the groups it was a member of.
    pub fn leave_all(&self, conn: &ConnectionId) -> Vec<Group> {
        let mut inner = self.inner.lock();
        let Some(groups) = inner.joined.remove(conn) else {
            return Vec::new();
        };
        for group in &groups {
            if let Some(members) = inner.members.get_mut(group) {
                members.remove(conn);
                if members.is_empty() {
                    inner.members.remove(group);
                }
            }
        }
        groups.into_iter().collect()
    }

    /// Current members of a group
    pub fn members(&self, group: &Group) -> Vec<ConnectionId> {
        self.inner
            .lock()
            .members
            .get(group)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a connection is a member of a group
    pub fn contains(&self, group: &Group, conn: &ConnectionId) -> bool {
        self.inner
            .lock()
            .members
            .get(group)
            .is_some_and(|m| m.contains(conn))
    }

    /// Number of groups with at least one member
    pub fn group_count(&self) -> usize {
        self.inner.lock().members.len()
    }
}

impl fmt::Debug for BroadcastGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BroadcastGroups")
            .field("groups", &inner.members.len())
            .field("connections", &inner.joined.len())
            .finish()
    }
}
