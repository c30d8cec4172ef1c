//! Processor API client implementation.
//!
//! The processor speaks form-encoded requests with basic-auth on the secret
//! key. Every call here is a synchronous request/response pass-through; the
//! relay adds no retry of its own.

use std::time::Duration;

use reqwest::Client;

use payrelay_core::routing::Metadata;
use payrelay_core::UserId;

use super::types::{
    BankToken, Charge, Customer, PaymentIntent, PaymentMethod, Price, SetupIntent, Source,
    StripeErrorResponse, Subscription,
};

/// Error type for processor operations.
#[derive(Debug, thiserror::Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The processor API returned an error.
    #[error("Stripe API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Parameters for creating a payment intent.
#[derive(Debug, Clone)]
pub struct PaymentIntentParams {
    /// Amount in the smallest currency unit.
    pub amount: i64,
    /// Currency code.
    pub currency: String,
    /// Processor customer id.
    pub customer: String,
    /// Payment method to charge, when already collected.
    pub payment_method: Option<String>,
    /// Whether to confirm immediately.
    pub confirm: bool,
    /// Routing metadata to attach.
    pub metadata: Metadata,
}

/// Processor API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    api_base: String,
}

impl StripeClient {
    /// Production API base URL.
    const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StripeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StripeError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_base: Self::BASE_URL.to_string(),
        })
    }

    /// Override the API base URL (tests point this at a local mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api_base = base_url.into();
        self
    }

    // =========================================================================
    // Customers
    // =========================================================================

    /// Create a processor customer, tagging it with our user id.
    pub async fn create_customer(
        &self,
        user_id: UserId,
        email: Option<&str>,
        name: Option<&str>,
    ) -> Result<Customer, StripeError> {
        let mut params = vec![("metadata[user_id]", user_id.to_string())];
        if let Some(email) = email {
            params.push(("email", email.to_string()));
        }
        if let Some(name) = name {
            params.push(("name", name.to_string()));
        }

        self.post("/customers", &params).await
    }

    // =========================================================================
    // Setup Intents (bank-account collection)
    // =========================================================================

    /// Create a setup intent collecting a US bank account for `customer_id`.
    pub async fn create_setup_intent(
        &self,
        customer_id: &str,
    ) -> Result<SetupIntent, StripeError> {
        let params = vec![
            ("customer", customer_id.to_string()),
            ("payment_method_types[]", "us_bank_account".to_string()),
        ];

        self.post("/setup_intents", &params).await
    }

    /// Retrieve a setup intent by ID.
    pub async fn get_setup_intent(
        &self,
        setup_intent_id: &str,
    ) -> Result<SetupIntent, StripeError> {
        self.get(&format!("/setup_intents/{setup_intent_id}")).await
    }

    /// Retrieve a payment method by ID.
    pub async fn get_payment_method(
        &self,
        payment_method_id: &str,
    ) -> Result<PaymentMethod, StripeError> {
        self.get(&format!("/payment_methods/{payment_method_id}"))
            .await
    }

    // =========================================================================
    // Payment Intents
    // =========================================================================

    /// Create a payment intent.
    pub async fn create_payment_intent(
        &self,
        params: &PaymentIntentParams,
    ) -> Result<PaymentIntent, StripeError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), params.amount.to_string()),
            ("currency".into(), params.currency.clone()),
            ("customer".into(), params.customer.clone()),
        ];
        if let Some(pm) = &params.payment_method {
            form.push(("payment_method".into(), pm.clone()));
        }
        if params.confirm {
            form.push(("confirm".into(), "true".into()));
        }
        for (key, value) in &params.metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        self.post("/payment_intents", &form).await
    }

    /// Confirm a previously created payment intent.
    pub async fn confirm_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent, StripeError> {
        self.post::<PaymentIntent, (String, String)>(
            &format!("/payment_intents/{payment_intent_id}/confirm"),
            &[],
        )
        .await
    }

    /// Retrieve a payment intent by ID.
    pub async fn get_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentIntent, StripeError> {
        self.get(&format!("/payment_intents/{payment_intent_id}"))
            .await
    }

    /// Retrieve a charge by ID.
    pub async fn get_charge(&self, charge_id: &str) -> Result<Charge, StripeError> {
        self.get(&format!("/charges/{charge_id}")).await
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Create a recurring price under an inline product.
    pub async fn create_price(
        &self,
        unit_amount: i64,
        currency: &str,
        interval: &str,
        product_name: &str,
    ) -> Result<Price, StripeError> {
        let params = vec![
            ("unit_amount", unit_amount.to_string()),
            ("currency", currency.to_string()),
            ("recurring[interval]", interval.to_string()),
            ("product_data[name]", product_name.to_string()),
        ];

        self.post("/prices", &params).await
    }

    /// Create a subscription for a customer on a price.
    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        metadata: &Metadata,
    ) -> Result<Subscription, StripeError> {
        let mut form: Vec<(String, String)> = vec![
            ("customer".into(), customer_id.to_string()),
            ("items[0][price]".into(), price_id.to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }

        self.post("/subscriptions", &form).await
    }

    /// Retrieve a subscription by ID.
    pub async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, StripeError> {
        self.get(&format!("/subscriptions/{subscription_id}")).await
    }

    /// Cancel a subscription.
    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Subscription, StripeError> {
        let response = self
            .client
            .delete(format!("{}/subscriptions/{subscription_id}", self.api_base))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    // =========================================================================
    // Legacy bank tokens / sources
    // =========================================================================

    /// Create a legacy bank-account token.
    pub async fn create_bank_token(
        &self,
        country: &str,
        currency: &str,
        account_holder_name: &str,
        routing_number: &str,
        account_number: &str,
    ) -> Result<BankToken, StripeError> {
        let params = vec![
            ("bank_account[country]", country.to_string()),
            ("bank_account[currency]", currency.to_string()),
            (
                "bank_account[account_holder_name]",
                account_holder_name.to_string(),
            ),
            ("bank_account[routing_number]", routing_number.to_string()),
            ("bank_account[account_number]", account_number.to_string()),
        ];

        self.post("/tokens", &params).await
    }

    /// Retrieve a legacy bank source by ID.
    pub async fn get_source(&self, source_id: &str) -> Result<Source, StripeError> {
        self.get(&format!("/sources/{source_id}")).await
    }

    /// Verify a legacy bank source with micro-deposit amounts.
    pub async fn verify_source(
        &self,
        source_id: &str,
        amounts: [i64; 2],
    ) -> Result<Source, StripeError> {
        let params = vec![
            ("values[]", amounts[0].to_string()),
            ("values[]", amounts[1].to_string()),
        ];

        self.post(&format!("/sources/{source_id}/verify"), &params)
            .await
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    /// Form-encoded POST.
    async fn post<T, P>(&self, path: &str, params: &[P]) -> Result<T, StripeError>
    where
        T: serde::de::DeserializeOwned,
        P: serde::Serialize,
    {
        let response = self
            .client
            .post(format!("{}{path}", self.api_base))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(params)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// GET.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, StripeError> {
        let response = self
            .client
            .get(format!("{}{path}", self.api_base))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle an API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse the processor's error envelope
        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(StripeError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(StripeError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}
