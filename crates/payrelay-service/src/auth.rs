//! Authentication extractor for service-to-service requests.
//!
//! Relay endpoints are called by the surrounding application, never by end
//! users, so the only credential is a pre-shared service API key carried in
//! the `x-service-key` header.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// Proof that the request carried the configured service API key.
#[derive(Debug, Clone, Copy)]
pub struct ServiceAuth;

impl FromRequestParts<Arc<AppState>> for ServiceAuth {
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        state: &'life1 Arc<AppState>,
    ) -> ::core::pin::Pin<
        Box<
            dyn ::core::future::Future<Output = Result<Self, Self::Rejection>>
                + ::core::marker::Send
                + 'async_trait,
        >,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let Some(expected) = state.config.service_api_key.as_deref() else {
                // No key configured - open access (development mode).
                tracing::warn!("SERVICE_API_KEY not configured - skipping service auth");
                return Ok(ServiceAuth);
            };

            let provided = parts
                .headers
                .get("x-service-key")
                .and_then(|v| v.to_str().ok())
                .ok_or(ApiError::Unauthorized)?;

            if constant_time_eq(provided, expected) {
                Ok(ServiceAuth)
            } else {
                Err(ApiError::Unauthorized)
            }
        })
    }
}
