//! Authentication extractor
//!
//! Pulls the bearer credential off the Authorization header and runs it
//! through the token verifier. Verification failures keep their own error
//! codes so clients can tell an expired token from a malformed one.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use campus_core::Snowflake;

use crate::response::ApiError;
use crate::state::AppState;

/// Authenticated user extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// User ID from the verified credential
    pub user_id: Snowflake,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|e| {
                    if e.is_missing() {
                        ApiError::MissingAuth
                    } else {
                        ApiError::InvalidAuthFormat
                    }
                })?;

        let user_id = AppState::from_ref(state)
            .verifier()
            .verify(bearer.token())
            .map_err(|e| {
                tracing::warn!(error = %e, "Bearer verification failed");
                ApiError::App(e)
            })?;

        Ok(AuthUser { user_id })
    }
}
