//! Payment-intent creation handler.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use payrelay_core::routing::{self, Metadata};
use payrelay_core::UserId;
use payrelay_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::PaymentIntentParams;

/// Create-payment request.
#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    /// Our user id.
    pub user_id: UserId,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    /// Currency code (default "usd").
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Routing metadata to attach to the intent.
    #[serde(default)]
    pub metadata: Metadata,
    /// Confirm immediately (default true).
    #[serde(default = "default_confirm")]
    pub confirm: bool,
}

fn default_currency() -> String {
    "usd".to_string()
}

fn default_confirm() -> bool {
    true
}

/// Payment response.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    /// Payment intent id.
    pub payment_intent_id: String,
    /// Processor-side status.
    pub status: String,
    /// Amount.
    pub amount: i64,
}

/// Create (and by default confirm) a payment intent for a user.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let stripe = state.stripe()?;

    if req.amount <= 0 {
        return Err(ApiError::BadRequest("amount must be positive".into()));
    }

    // An intent created with metadata the webhook path cannot route is a
    // payment we could never reconcile; reject it here instead.
    routing::decode(&req.metadata)?;

    let customer = state
        .store
        .get_customer(req.user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("No customer for user {}", req.user_id)))?;
    let customer_id = customer
        .customer_id
        .ok_or_else(|| ApiError::BadRequest("Customer has no processor id".into()))?;

    let params = PaymentIntentParams {
        amount: req.amount,
        currency: req.currency,
        customer: customer_id,
        payment_method: customer.payment_method_id,
        confirm: req.confirm,
        metadata: req.metadata,
    };

    let intent = stripe.create_payment_intent(&params).await?;

    tracing::info!(
        user_id = %req.user_id,
        payment_intent_id = %intent.id,
        amount = %intent.amount,
        status = %intent.status,
        "Payment intent created"
    );

    Ok(Json(PaymentResponse {
        payment_intent_id: intent.id,
        status: intent.status,
        amount: intent.amount,
    }))
}

/// Retrieve a payment intent's current processor-side state.
pub async fn get_payment(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(payment_intent_id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let stripe = state.stripe()?;

    let intent = stripe.get_payment_intent(&payment_intent_id).await?;

    Ok(Json(PaymentResponse {
        payment_intent_id: intent.id,
        status: intent.status,
        amount: intent.amount,
    }))
}

/// Confirm a payment intent created with `confirm: false`.
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(payment_intent_id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let stripe = state.stripe()?;

    let intent = stripe.confirm_payment_intent(&payment_intent_id).await?;

    tracing::info!(
        payment_intent_id = %intent.id,
        status = %intent.status,
        "Payment intent confirmed"
    );

    Ok(Json(PaymentResponse {
        payment_intent_id: intent.id,
        status: intent.status,
        amount: intent.amount,
    }))
}
