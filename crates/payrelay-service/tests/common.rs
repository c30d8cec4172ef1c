//! Common test utilities for payrelay integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::{TestResponse, TestServer};
use tempfile::TempDir;

use payrelay_service::stripe::webhook::sign_payload;
use payrelay_service::{create_router, AppState, ServiceConfig};
use payrelay_store::RocksStore;

/// Webhook signing secret used by every harness.
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Service API key used by every harness.
pub const SERVICE_API_KEY: &str = "test-service-key";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct store access for seeding and inspecting records.
    pub store: Arc<RocksStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            service_api_key: Some(SERVICE_API_KEY.into()),
            stripe_api_key: None,
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            event_retention_days: 30,
            webhook_tolerance_seconds: 300,
        };

        let state = AppState::new(Arc::clone(&store), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            _temp_dir: temp_dir,
        }
    }

    /// Post a webhook body with a freshly signed `stripe-signature` header.
    pub async fn post_signed_event(&self, event: &serde_json::Value) -> TestResponse {
        let body = event.to_string();
        let header = sign_payload(&body, WEBHOOK_SECRET, chrono::Utc::now().timestamp());

        self.server
            .post("/webhooks/stripe")
            .add_header("stripe-signature", header)
            .text(body)
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a `payment_intent.*` event with the given metadata pairs.
pub fn payment_intent_event(
    event_id: &str,
    event_type: &str,
    payment_intent_id: &str,
    metadata: &[(&str, &str)],
) -> serde_json::Value {
    let metadata: serde_json::Map<String, serde_json::Value> = metadata
        .iter()
        .map(|(k, v)| ((*k).to_string(), serde_json::Value::String((*v).to_string())))
        .collect();

    serde_json::json!({
        "id": event_id,
        "type": event_type,
        "created": chrono::Utc::now().timestamp(),
        "data": {
            "object": {
                "id": payment_intent_id,
                "object": "payment_intent",
                "amount": 2500,
                "currency": "usd",
                "status": event_type.trim_start_matches("payment_intent."),
                "metadata": metadata,
            }
        }
    })
}
