//! Relay endpoint integration tests.

mod common;

use std::sync::Arc;

use common::{TestHarness, SERVICE_API_KEY};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payrelay_core::{Customer, UserId};
use payrelay_service::{create_router, AppState, ServiceConfig, StripeClient};
use payrelay_store::{RocksStore, Store};

/// Harness variant whose processor client points at a mock server.
async fn harness_with_processor(server: &MockServer) -> TestHarness {
    let harness = TestHarness::new();

    let config = ServiceConfig {
        service_api_key: Some(SERVICE_API_KEY.into()),
        stripe_api_key: Some("sk_test_key".into()),
        stripe_webhook_secret: Some(common::WEBHOOK_SECRET.into()),
        ..ServiceConfig::default()
    };

    let store: Arc<RocksStore> = Arc::clone(&harness.store);
    let mut state = AppState::new(store, config);
    state.stripe = Some(Arc::new(
        StripeClient::new("sk_test_key")
            .expect("client")
            .with_base_url(server.uri()),
    ));

    let server_router = create_router(state);
    TestHarness {
        server: axum_test::TestServer::new(server_router).expect("test server"),
        store: harness.store,
        _temp_dir: harness._temp_dir,
    }
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn relay_endpoints_require_the_service_key() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/customers")
        .json(&json!({ "user_id": 42 }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn wrong_service_key_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/customers")
        .add_header("x-service-key", "not-the-key")
        .json(&json!({ "user_id": 42 }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn unconfigured_processor_surfaces_as_bad_gateway() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/customers")
        .add_header("x-service-key", SERVICE_API_KEY)
        .json(&json!({ "user_id": 42 }))
        .await;

    assert_eq!(response.status_code(), 502);
}

// ============================================================================
// Customer creation and bank-account collection
// ============================================================================

#[tokio::test]
async fn create_customer_persists_processor_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_1" })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = harness_with_processor(&server).await;

    let response = harness
        .server
        .post("/v1/customers")
        .add_header("x-service-key", SERVICE_API_KEY)
        .json(&json!({ "user_id": 42, "email": "a@example.com" }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["customer_id"], "cus_1");
    assert_eq!(body["status"], "pending");

    let customer = harness.store.get_customer(UserId::new(42)).unwrap().unwrap();
    assert_eq!(customer.customer_id.as_deref(), Some("cus_1"));
}

#[tokio::test]
async fn create_customer_is_idempotent_per_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_1" })))
        .expect(1) // Second call must not hit the processor again
        .mount(&server)
        .await;

    let harness = harness_with_processor(&server).await;

    for _ in 0..2 {
        harness
            .server
            .post("/v1/customers")
            .add_header("x-service-key", SERVICE_API_KEY)
            .json(&json!({ "user_id": 42 }))
            .await
            .assert_status_ok();
    }
}

#[tokio::test]
async fn setup_intent_is_stored_on_the_customer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/setup_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "seti_1",
            "status": "requires_payment_method",
            "customer": "cus_1",
            "client_secret": "seti_1_secret",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = harness_with_processor(&server).await;

    let mut customer = Customer::new(UserId::new(42));
    customer.customer_id = Some("cus_1".into());
    harness.store.put_customer(&customer).unwrap();

    let response = harness
        .server
        .post("/v1/customers/setup-intent")
        .add_header("x-service-key", SERVICE_API_KEY)
        .json(&json!({ "user_id": 42 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["setup_intent_id"], "seti_1");
    assert_eq!(body["client_secret"], "seti_1_secret");

    // The webhook path resolves setup-intent events through this reference.
    let found = harness
        .store
        .find_customer_by_setup_intent("seti_1")
        .unwrap()
        .unwrap();
    assert_eq!(found.user_id, UserId::new(42));
}

#[tokio::test]
async fn setup_intent_for_unknown_user_is_not_found() {
    let server = MockServer::start().await;
    let harness = harness_with_processor(&server).await;

    let response = harness
        .server
        .post("/v1/customers/setup-intent")
        .add_header("x-service-key", SERVICE_API_KEY)
        .json(&json!({ "user_id": 42 }))
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Payments
// ============================================================================

#[tokio::test]
async fn create_payment_attaches_routing_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_1",
            "amount": 2500,
            "currency": "usd",
            "status": "processing",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = harness_with_processor(&server).await;

    let mut customer = Customer::new(UserId::new(42));
    customer.customer_id = Some("cus_1".into());
    customer.payment_method_id = Some("pm_1".into());
    harness.store.put_customer(&customer).unwrap();

    let response = harness
        .server
        .post("/v1/payments")
        .add_header("x-service-key", SERVICE_API_KEY)
        .json(&json!({
            "user_id": 42,
            "amount": 2500,
            "metadata": { "order_type": "request_payment", "user_id": "42" },
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["payment_intent_id"], "pi_1");
    assert_eq!(body["status"], "processing");
}

#[tokio::test]
async fn unroutable_payment_metadata_is_rejected_before_the_processor() {
    let server = MockServer::start().await;
    // No mock mounted: a processor call would fail the test via 404 + expect
    let harness = harness_with_processor(&server).await;

    let mut customer = Customer::new(UserId::new(42));
    customer.customer_id = Some("cus_1".into());
    harness.store.put_customer(&customer).unwrap();

    let response = harness
        .server
        .post("/v1/payments")
        .add_header("x-service-key", SERVICE_API_KEY)
        .json(&json!({
            "user_id": 42,
            "amount": 2500,
            "metadata": { "order_type": "gift_card" },
        }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn get_customer_reads_the_local_record() {
    let harness = TestHarness::new();

    let mut customer = Customer::new(UserId::new(42));
    customer.customer_id = Some("cus_1".into());
    harness.store.put_customer(&customer).unwrap();

    let response = harness
        .server
        .get("/v1/customers")
        .add_query_param("user_id", 42)
        .add_header("x-service-key", SERVICE_API_KEY)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["customer_id"], "cus_1");

    let missing = harness
        .server
        .get("/v1/customers")
        .add_query_param("user_id", 7)
        .add_header("x-service-key", SERVICE_API_KEY)
        .await;
    missing.assert_status_not_found();
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn create_subscription_chains_price_and_subscription() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "price_1",
            "unit_amount": 900,
            "currency": "usd",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sub_1",
            "status": "active",
            "customer": "cus_1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = harness_with_processor(&server).await;

    let mut customer = Customer::new(UserId::new(42));
    customer.customer_id = Some("cus_1".into());
    harness.store.put_customer(&customer).unwrap();

    let response = harness
        .server
        .post("/v1/subscriptions")
        .add_header("x-service-key", SERVICE_API_KEY)
        .json(&json!({ "user_id": 42, "amount": 900 }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["subscription_id"], "sub_1");
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn cancel_subscription_forwards_to_the_processor() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/subscriptions/sub_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sub_1",
            "status": "canceled",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = harness_with_processor(&server).await;

    let response = harness
        .server
        .delete("/v1/subscriptions/sub_1")
        .add_header("x-service-key", SERVICE_API_KEY)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "canceled");
}
