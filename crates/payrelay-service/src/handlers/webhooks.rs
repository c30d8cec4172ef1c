//! Processor webhook handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::reconcile;
use crate::state::AppState;
use crate::stripe::types::WebhookEvent;
use crate::stripe::webhook::{construct_event, WebhookError};

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was processed.
    pub received: bool,
}

/// Handle processor webhooks.
///
/// Verification happens against the raw body before anything is parsed;
/// a delivery that fails it never reaches the reconciler.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let event: WebhookEvent = if let Some(secret) = &state.config.stripe_webhook_secret {
        let sig = signature
            .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

        construct_event(&body, sig, secret, state.config.webhook_tolerance_seconds).map_err(
            |e| match e {
                WebhookError::MalformedPayload(msg) => {
                    ApiError::BadRequest(format!("Malformed event payload: {msg}"))
                }
                _ => {
                    tracing::warn!(error = %e, "Invalid webhook signature");
                    ApiError::BadRequest("Invalid webhook signature".into())
                }
            },
        )?
    } else {
        // No webhook_secret configured - skip verification (development mode)
        tracing::warn!("Stripe webhook_secret not configured - skipping signature verification");
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received processor webhook"
    );

    let outcome = reconcile::process_event(&state, &event).await?;

    tracing::info!(
        event_id = %event.id,
        outcome = %outcome,
        "Webhook reconciled"
    );

    Ok(Json(WebhookResponse { received: true }))
}
