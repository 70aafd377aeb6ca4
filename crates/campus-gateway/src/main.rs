//! Campus realtime server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p campus-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use std::sync::Arc;

use campus_common::{try_init_tracing, AppConfig, JwtVerifier, TracingConfig};
use campus_gateway::{build_state, create_app};
use campus_store::MemoryStore;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = try_init_tracing(TracingConfig::default()) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Server failed to start");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting campus realtime server...");

    let config = AppConfig::from_env()?;
    info!(
        env = ?config.app.env,
        port = config.server.port,
        "Configuration loaded"
    );

    let store = Arc::new(MemoryStore::new());
    let verifier = Arc::new(JwtVerifier::new(
        &config.auth.jwt_secret,
        config.auth.token_expiry_secs,
    ));

    let address = config.server.address();
    let state = build_state(store, verifier, config);
    let app = create_app(state);

    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
