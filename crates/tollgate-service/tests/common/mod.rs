//! Common test utilities for tollgate integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_test::TestServer;

use tollgate_core::{User, UserId, WebhookDeliveryLog, WebhookId};
use tollgate_service::auth::{encode_session_token, SessionClaims};
use tollgate_service::{create_router, AppState, ServiceConfig};
use tollgate_store::{MemoryStore, Store};

/// Session signing secret used by every harness.
pub const SESSION_SECRET: &str = "test-session-secret";

/// Admin key used by every harness.
pub const ADMIN_KEY: &str = "test-admin-key";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The in-memory store behind the server.
    pub store: Arc<MemoryStore>,
    /// Application state shared with the server.
    pub state: AppState,
    /// A user with an API key.
    pub user_id: UserId,
    /// That user's API key.
    pub api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh store and one API-key user.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            session_secret: Some(SESSION_SECRET.into()),
            admin_api_key: Some(ADMIN_KEY.into()),
            webhook_timeout_seconds: 2,
            ..ServiceConfig::default()
        };

        let user_id = UserId::generate();
        let api_key = format!("tg_test_{}", user_id.as_uuid().simple());
        let mut user = User::new(user_id, Some("owner@example.com".into()));
        user.api_key = Some(api_key.clone());
        store.put_user(&user).await.expect("Failed to seed user");

        let state = AppState::new(store.clone(), config);
        let router: Router = create_router(state.clone());
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            state,
            user_id,
            api_key,
        }
    }

    /// `Authorization` header value for the seeded user.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    /// `Cookie` header value carrying a session for the seeded user.
    pub fn session_cookie(&self) -> String {
        Self::session_cookie_for(self.user_id)
    }

    /// `Cookie` header value carrying a session for `user_id`.
    pub fn session_cookie_for(user_id: UserId) -> String {
        let claims = SessionClaims::new(user_id, None, chrono::Duration::hours(1));
        let token = encode_session_token(&claims, SESSION_SECRET).expect("Failed to sign session");
        format!("tollgate_session={token}")
    }

    /// Poll the delivery log until `count` rows exist for `webhook_id`.
    pub async fn wait_for_deliveries(
        &self,
        webhook_id: &WebhookId,
        count: usize,
    ) -> Vec<WebhookDeliveryLog> {
        for _ in 0..100 {
            let rows = self
                .store
                .list_deliveries(webhook_id, 100)
                .await
                .expect("Failed to read deliveries");
            if rows.len() >= count {
                return rows;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for {count} deliveries to {webhook_id}");
    }
}
