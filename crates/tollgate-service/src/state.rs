//! Application state.

use std::sync::Arc;
use std::time::Duration;

use tollgate_store::Store;

use crate::config::ServiceConfig;
use crate::dispatcher::WebhookDispatcher;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Outgoing webhook dispatcher.
    pub dispatcher: WebhookDispatcher,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let dispatcher = WebhookDispatcher::new(
            Arc::clone(&store),
            Duration::from_secs(config.webhook_timeout_seconds),
        );

        if config.session_secret.is_none() {
            tracing::warn!("SESSION_SECRET not configured - session authentication is disabled");
        }

        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not configured - admin endpoints will reject all requests");
        }

        Self {
            store,
            config,
            dispatcher,
        }
    }
}
