//! Application configuration
//!
//! Assembled from environment variables, with `.env` support in development.

use std::env;
use std::str::FromStr;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_TOKEN_EXPIRY_SECS: i64 = 86_400;
const DEFAULT_MESSAGE_BUFFER: usize = 100;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub gateway: GatewayConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" => Ok(Self::Production),
            _ => Err(()),
        }
    }
}

/// Server bind configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bearer-token verification configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_secs: i64,
}

/// CORS configuration
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Realtime gateway tuning
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Per-connection outbound channel capacity
    pub message_buffer: usize,
    /// Worker id for the snowflake generator
    pub worker_id: u16,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: var("APP_NAME").unwrap_or_else(|| "campus-realtime".to_string()),
                env: parsed("APP_ENV").unwrap_or_default(),
            },
            server: ServerConfig {
                host: var("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
                port: parsed("SERVER_PORT").unwrap_or(DEFAULT_PORT),
            },
            auth: AuthConfig {
                jwt_secret: var("JWT_SECRET").ok_or(ConfigError::MissingVar("JWT_SECRET"))?,
                token_expiry_secs: parsed("JWT_TOKEN_EXPIRY")
                    .unwrap_or(DEFAULT_TOKEN_EXPIRY_SECS),
            },
            cors: CorsConfig {
                allowed_origins: var("CORS_ALLOWED_ORIGINS")
                    .map(|s| s.split(',').map(str::trim).map(String::from).collect())
                    .unwrap_or_default(),
            },
            gateway: GatewayConfig {
                message_buffer: parsed("GATEWAY_MESSAGE_BUFFER").unwrap_or(DEFAULT_MESSAGE_BUFFER),
                worker_id: parsed("SNOWFLAKE_WORKER_ID").unwrap_or(0),
            },
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    var(key)?.parse().ok()
}
