//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{customers, health, payments, subscriptions, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for relay endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Relay (service API key auth)
/// - `POST /v1/customers` - Create processor customer
/// - `GET  /v1/customers` - Get the local customer record
/// - `POST /v1/customers/setup-intent` - Start bank-account collection
/// - `GET  /v1/customers/payment-method` - Retrieve collected payment method
/// - `POST /v1/customers/bank-token` - Legacy bank-account token
/// - `POST /v1/customers/verify-source` - Legacy micro-deposit verification
/// - `GET  /v1/customers/source/{id}` - Retrieve a legacy bank source
/// - `POST /v1/payments` - Create a payment intent
/// - `GET  /v1/payments/{id}` - Retrieve a payment intent
/// - `POST /v1/payments/{id}/confirm` - Confirm a payment intent
/// - `POST /v1/subscriptions` - Create a subscription
/// - `GET  /v1/subscriptions/{id}` - Retrieve a subscription
/// - `DELETE /v1/subscriptions/{id}` - Cancel a subscription
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/stripe` - Processor webhooks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Create concurrency-limited relay routes
    let api_routes = Router::new()
        // Customers / bank-account collection
        .route(
            "/customers",
            post(customers::create_customer).get(customers::get_customer),
        )
        .route("/customers/setup-intent", post(customers::create_setup_intent))
        .route("/customers/payment-method", get(customers::get_payment_method))
        .route("/customers/bank-token", post(customers::create_bank_token))
        .route("/customers/verify-source", post(customers::verify_source))
        .route("/customers/source/:id", get(customers::get_source))
        // Payments
        .route("/payments", post(payments::create_payment))
        .route("/payments/:id", get(payments::get_payment))
        .route("/payments/:id/confirm", post(payments::confirm_payment))
        // Subscriptions
        .route("/subscriptions", post(subscriptions::create_subscription))
        .route(
            "/subscriptions/:id",
            get(subscriptions::get_subscription).delete(subscriptions::cancel_subscription),
        )
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - delivery volume is the processor's call)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
