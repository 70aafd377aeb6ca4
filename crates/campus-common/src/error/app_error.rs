//! Application error types
//!
//! Unified error handling for the application boundary. The taxonomy:
//! unauthenticated (refused at connect/request time), forbidden (known user,
//! disallowed action), not-found, malformed client input, and internal.
//! Best-effort failures never become an `AppError`; they are logged and
//! swallowed at the point of occurrence.

use campus_core::DomainError;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Missing authentication")]
    MissingAuth,

    // Authorization errors not covered by the domain layer
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Client input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed identifier: {0}")]
    Malformed(String),

    // Resource errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Malformed(_) => 400,
            Self::InvalidToken | Self::TokenExpired | Self::MissingAuth => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Internal(_) | Self::Config(_) => 500,
            Self::Domain(e) => {
                if e.is_not_found() {
                    404
                } else if e.is_authorization() {
                    403
                } else if e.is_validation() {
                    400
                } else {
                    500
                }
            }
        }
    }

    /// Get error code for API responses
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::MissingAuth => "MISSING_AUTH",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Malformed(_) => "MALFORMED_ID",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Domain(e) => e.code(),
        }
    }

    /// Check if this is a client error (4xx)
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
