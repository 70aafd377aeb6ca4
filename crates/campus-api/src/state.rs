//! Application state
//!
//! Shared state for both the REST surface and the realtime gateway. The
//! registry, presence set, and broadcast groups live inside the engine and
//! dispatcher; constructing a fresh `AppState` yields fully isolated
//! realtime state, which is what the test suite relies on.

use std::sync::Arc;

use campus_common::{AppConfig, TokenVerifier};
use campus_core::ChatStore;
use campus_realtime::{FanoutEngine, FrameDispatcher};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn ChatStore>,
    engine: Arc<FanoutEngine>,
    dispatcher: Arc<FrameDispatcher>,
    verifier: Arc<dyn TokenVerifier>,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        store: Arc<dyn ChatStore>,
        engine: Arc<FanoutEngine>,
        dispatcher: Arc<FrameDispatcher>,
        verifier: Arc<dyn TokenVerifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            engine,
            dispatcher,
            verifier,
            config: Arc::new(config),
        }
    }

    /// Get the storage collaborator
    pub fn store(&self) -> &dyn ChatStore {
        self.store.as_ref()
    }

    /// Get the fan-out engine
    pub fn engine(&self) -> &FanoutEngine {
        &self.engine
    }

    /// Get the frame dispatcher
    pub fn dispatcher(&self) -> &FrameDispatcher {
        &self.dispatcher
    }

    /// Get the token verifier
    pub fn verifier(&self) -> &dyn TokenVerifier {
        self.verifier.as_ref()
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
