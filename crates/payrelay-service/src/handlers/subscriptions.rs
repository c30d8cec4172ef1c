//! Subscription handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use payrelay_core::routing::Metadata;
use payrelay_core::UserId;
use payrelay_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Create-subscription request.
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    /// Our user id.
    pub user_id: UserId,
    /// Recurring amount in the smallest currency unit.
    pub amount: i64,
    /// Currency code (default "usd").
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Billing interval (default "month").
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Product name shown on processor invoices.
    #[serde(default = "default_product_name")]
    pub product_name: String,
    /// Metadata to attach to the subscription.
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_interval() -> String {
    "month".to_string()
}

fn default_product_name() -> String {
    "Payrelay subscription".to_string()
}

/// Subscription response.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// Subscription id.
    pub subscription_id: String,
    /// Processor-side status.
    pub status: String,
}

/// Create a price and subscription for a customer.
pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let stripe = state.stripe()?;

    if req.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be positive".into()));
    }

    let customer = state
        .store
        .get_customer(req.user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("No customer for user {}", req.user_id)))?;
    let customer_id = customer
        .customer_id
        .ok_or_else(|| ApiError::BadRequest("Customer has no processor id".into()))?;

    let price = stripe
        .create_price(req.amount, &req.currency, &req.interval, &req.product_name)
        .await?;

    let subscription = stripe
        .create_subscription(&customer_id, &price.id, &req.metadata)
        .await?;

    tracing::info!(
        user_id = %req.user_id,
        subscription_id = %subscription.id,
        price_id = %price.id,
        "Subscription created"
    );

    Ok(Json(SubscriptionResponse {
        subscription_id: subscription.id,
        status: subscription.status,
    }))
}

/// Retrieve a subscription's current processor-side state.
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(subscription_id): Path<String>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let stripe = state.stripe()?;

    let subscription = stripe.get_subscription(&subscription_id).await?;

    Ok(Json(SubscriptionResponse {
        subscription_id: subscription.id,
        status: subscription.status,
    }))
}

/// Cancel a subscription.
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(subscription_id): Path<String>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let stripe = state.stripe()?;

    let subscription = stripe.cancel_subscription(&subscription_id).await?;

    tracing::info!(subscription_id = %subscription.id, "Subscription canceled");

    Ok(Json(SubscriptionResponse {
        subscription_id: subscription.id,
        status: subscription.status,
    }))
}
