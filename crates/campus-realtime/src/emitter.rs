//! Targeted emission
//!
//! Resolves "deliver this event to user X" into either a direct-connection
//! send or a send to the user's own broadcast group. The group fallback is
//! routine, not an error path: registry entries go stale whenever a newer
//! connection displaces an older one or a second tab never registered, and
//! every authenticated connection joins its user group, so the group reaches
//! whatever is actually alive. Zero subscribers means the event is dropped;
//! notifications are best-effort.

use serde_json::Value;

use campus_core::Snowflake;

use crate::events::{Emission, EventName};
use crate::groups::Group;
use crate::registry::ConnectionRegistry;

/// Build the emission that delivers `event` to a single user
#[must_use]
pub fn emit_to_user(
    registry: &ConnectionRegistry,
    user_id: Snowflake,
    event: EventName,
    payload: Value,
) -> Emission {
    match registry.lookup(user_id) {
        Some(conn) => Emission::to_connection(conn, event, payload),
        None => {
            tracing::trace!(
                user_id = %user_id,
                event = %event,
                "Registry miss, falling back to user group"
            );
            Emission::to_group(Group::user(user_id), event, payload)
        }
    }
}
