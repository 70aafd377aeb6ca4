//! JWT verification using the `jsonwebtoken` crate

use campus_core::Snowflake;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Get the user ID as a Snowflake
    ///
    /// # Errors
    /// Returns an error if the subject cannot be parsed as a Snowflake
    pub fn user_id(&self) -> Result<Snowflake, AppError> {
        self.sub
            .parse::<i64>()
            .map(Snowflake::new)
            .map_err(|_| AppError::InvalidToken)
    }
}

/// Verifies a bearer credential and yields the authenticated user id
///
/// The identity service that issues credentials is an external collaborator;
/// the gateway and REST layers only consume verification through this trait.
pub trait TokenVerifier: Send + Sync {
    /// Verify a bearer token and return the authenticated user id
    fn verify(&self, token: &str) -> Result<Snowflake, AppError>;
}

/// HMAC-secret JWT verifier
#[derive(Clone)]
pub struct JwtVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry_secs: i64,
}

impl JwtVerifier {
    /// Create a new verifier with the given shared secret
    #[must_use]
    pub fn new(secret: &str, token_expiry_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_expiry_secs,
        }
    }

    /// Issue a token for a user
    ///
    /// Issuance belongs to the external identity service in production; this
    /// exists for local development and the test suite.
    pub fn issue(&self, user_id: Snowflake) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.token_expiry_secs)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(e.into()))
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Snowflake, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            },
        )?;
        data.claims.user_id()
    }
}
