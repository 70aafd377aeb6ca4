//! Gateway server setup
//!
//! Builds the shared application state and the combined router (WebSocket
//! route + REST fallback).

mod handler;

pub use handler::gateway_handler;

use axum::{http::HeaderValue, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use campus_api::AppState;
use campus_common::{AppConfig, TokenVerifier};
use campus_core::ChatStore;
use campus_realtime::{
    BroadcastGroups, ConnectionRegistry, FanoutEngine, FrameDispatcher, PresenceTracker,
};

/// Wire up fresh realtime state around the given collaborators
///
/// Every call builds an isolated registry/presence/groups trio, so tests can
/// spin up independent servers without shared process state.
pub fn build_state(
    store: Arc<dyn ChatStore>,
    verifier: Arc<dyn TokenVerifier>,
    config: AppConfig,
) -> AppState {
    let registry = Arc::new(ConnectionRegistry::new());
    let presence = Arc::new(PresenceTracker::new());
    let groups = Arc::new(BroadcastGroups::new());

    let engine = Arc::new(FanoutEngine::new(
        store.clone(),
        registry,
        presence,
        groups.clone(),
        config.gateway.worker_id,
    ));
    let dispatcher = Arc::new(FrameDispatcher::new(groups));

    AppState::new(store, engine, dispatcher, verifier, config)
}

/// Build the complete application router
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(state.config());

    Router::new()
        .merge(campus_api::create_router())
        .route("/ws", get(gateway_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
