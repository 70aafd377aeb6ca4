//! Bearer-token verification
//!
//! Token issuance lives with the external identity service; this module only
//! verifies the bearer credential presented at connect/request time.

mod token;

pub use token::{Claims, JwtVerifier, TokenVerifier};
