//! # campus-common
//!
//! Shared utilities including configuration, error handling, token
//! verification, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{Claims, JwtVerifier, TokenVerifier};
pub use config::{
    AppConfig, AppSettings, AuthConfig, ConfigError, CorsConfig, Environment, GatewayConfig,
    ServerConfig,
};
pub use error::{AppError, AppResult};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig};
