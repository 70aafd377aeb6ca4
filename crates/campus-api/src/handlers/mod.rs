//! Request handlers

pub mod conversations;
pub mod groups;
pub mod health;
pub mod presence;

use campus_core::Snowflake;

use crate::response::ApiError;

/// Parse a path segment as a snowflake id
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Snowflake, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::invalid_path(format!("Invalid {what} format")))
}
