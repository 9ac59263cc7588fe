//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use chat_auth_core::ports::{DatabaseService, IdentityProviderService};

use crate::config::Config;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    /// Absent when the deployment runs without an identity provider; logout
    /// then always redirects home.
    pub provider: Option<Arc<dyn IdentityProviderService>>,
    pub config: Arc<Config>,
}
