//! Application state.

use std::sync::Arc;

use payrelay_store::RocksStore;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::stripe::StripeClient;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Processor client (optional - relay endpoints fail without it).
    pub stripe: Option<Arc<StripeClient>>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        // Create the processor client if configured
        let stripe = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::new(key) {
                Ok(client) => {
                    tracing::info!("Stripe integration enabled");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if stripe.is_none() {
            tracing::warn!("Stripe not configured - relay endpoints will not be available");
        }

        Self {
            store,
            config,
            stripe,
        }
    }

    /// The processor client, or an error response when not configured.
    pub fn stripe(&self) -> Result<&Arc<StripeClient>, ApiError> {
        self.stripe
            .as_ref()
            .ok_or_else(|| ApiError::ExternalService("payment processor not configured".into()))
    }

    /// Check if the processor client is configured.
    #[must_use]
    pub fn has_stripe(&self) -> bool {
        self.stripe.is_some()
    }
}
