//! Customer and bank-account-collection handlers.
//!
//! These endpoints shape parameters and forward to the processor; the only
//! local state is the customer record tying our user id to the processor's
//! identifiers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use payrelay_core::{Customer, CustomerStatus, UserId};
use payrelay_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Create-customer request.
#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    /// Our user id.
    pub user_id: UserId,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
    /// Customer name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Customer response.
#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    /// Our user id.
    pub user_id: UserId,
    /// Processor customer id.
    pub customer_id: Option<String>,
    /// Verification status.
    pub status: String,
    /// Collected payment method, once verified.
    pub payment_method_id: Option<String>,
}

impl From<&Customer> for CustomerResponse {
    fn from(customer: &Customer) -> Self {
        Self {
            user_id: customer.user_id,
            customer_id: customer.customer_id.clone(),
            status: customer.status.to_string(),
            payment_method_id: customer.payment_method_id.clone(),
        }
    }
}

/// Create a processor customer for a user.
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let stripe = state.stripe()?;

    // Reuse the existing processor customer when we already have one.
    let mut customer = state
        .store
        .get_customer(req.user_id)?
        .unwrap_or_else(|| Customer::new(req.user_id));

    if customer.customer_id.is_none() {
        let created = stripe
            .create_customer(req.user_id, req.email.as_deref(), req.name.as_deref())
            .await?;
        tracing::info!(user_id = %req.user_id, customer_id = %created.id, "Processor customer created");
        customer.customer_id = Some(created.id);
        customer.updated_at = chrono::Utc::now();
        state.store.put_customer(&customer)?;
    }

    Ok(Json(CustomerResponse::from(&customer)))
}

/// Query for customer retrieval.
#[derive(Debug, Deserialize)]
pub struct GetCustomerQuery {
    /// Our user id.
    pub user_id: UserId,
}

/// Get the local customer record for a user. No processor call; the webhook
/// path keeps this record current.
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Query(query): Query<GetCustomerQuery>,
) -> Result<Json<CustomerResponse>, ApiError> {
    let customer = state
        .store
        .get_customer(query.user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("No customer for user {}", query.user_id)))?;

    Ok(Json(CustomerResponse::from(&customer)))
}

/// Setup-intent request.
#[derive(Debug, Deserialize)]
pub struct SetupIntentRequest {
    /// Our user id.
    pub user_id: UserId,
}

/// Setup-intent response.
#[derive(Debug, Serialize)]
pub struct SetupIntentResponse {
    /// Setup intent id.
    pub setup_intent_id: String,
    /// Client secret the caller completes collection with.
    pub client_secret: Option<String>,
}

/// Start bank-account collection for a user.
pub async fn create_setup_intent(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(req): Json<SetupIntentRequest>,
) -> Result<Json<SetupIntentResponse>, ApiError> {
    let stripe = state.stripe()?;

    let mut customer = state
        .store
        .get_customer(req.user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("No customer for user {}", req.user_id)))?;
    let customer_id = customer
        .customer_id
        .clone()
        .ok_or_else(|| ApiError::BadRequest("Customer has no processor id".into()))?;

    let setup_intent = stripe.create_setup_intent(&customer_id).await?;

    customer.setup_intent_id = Some(setup_intent.id.clone());
    customer.status = CustomerStatus::Pending;
    customer.updated_at = chrono::Utc::now();
    state.store.put_customer(&customer)?;

    tracing::info!(
        user_id = %req.user_id,
        setup_intent_id = %setup_intent.id,
        "Bank-account collection started"
    );

    Ok(Json(SetupIntentResponse {
        setup_intent_id: setup_intent.id,
        client_secret: setup_intent.client_secret,
    }))
}

/// Query for payment-method retrieval.
#[derive(Debug, Deserialize)]
pub struct PaymentMethodQuery {
    /// Our user id.
    pub user_id: UserId,
}

/// Payment-method response.
#[derive(Debug, Serialize)]
pub struct PaymentMethodResponse {
    /// Payment method id.
    pub payment_method_id: String,
    /// Method type.
    pub method_type: String,
    /// Bank-account details, when present.
    pub us_bank_account: Option<serde_json::Value>,
}

/// Retrieve the payment method collected for a user.
pub async fn get_payment_method(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Query(query): Query<PaymentMethodQuery>,
) -> Result<Json<PaymentMethodResponse>, ApiError> {
    let stripe = state.stripe()?;

    let customer = state
        .store
        .get_customer(query.user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("No customer for user {}", query.user_id)))?;

    // Prefer the reference captured from the webhook; fall back to asking
    // the processor via the stored setup intent.
    let payment_method_id = match customer.payment_method_id {
        Some(id) => id,
        None => {
            let setup_intent_id = customer.setup_intent_id.ok_or_else(|| {
                ApiError::NotFound("No payment method collected for this user".into())
            })?;
            stripe
                .get_setup_intent(&setup_intent_id)
                .await?
                .payment_method
                .ok_or_else(|| {
                    ApiError::NotFound("Setup intent has no payment method yet".into())
                })?
        }
    };

    let method = stripe.get_payment_method(&payment_method_id).await?;

    Ok(Json(PaymentMethodResponse {
        payment_method_id: method.id,
        method_type: method.method_type,
        us_bank_account: method.us_bank_account,
    }))
}

/// Legacy bank-token request.
#[derive(Debug, Deserialize)]
pub struct BankTokenRequest {
    /// Bank country code.
    #[serde(default = "default_country")]
    pub country: String,
    /// Currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Account holder name.
    pub account_holder_name: String,
    /// Routing number.
    pub routing_number: String,
    /// Account number.
    pub account_number: String,
}

fn default_country() -> String {
    "US".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

/// Legacy bank-token response.
#[derive(Debug, Serialize)]
pub struct BankTokenResponse {
    /// Token id.
    pub token_id: String,
}

/// Create a legacy bank-account token.
pub async fn create_bank_token(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(req): Json<BankTokenRequest>,
) -> Result<Json<BankTokenResponse>, ApiError> {
    let stripe = state.stripe()?;

    let token = stripe
        .create_bank_token(
            &req.country,
            &req.currency,
            &req.account_holder_name,
            &req.routing_number,
            &req.account_number,
        )
        .await?;

    Ok(Json(BankTokenResponse { token_id: token.id }))
}

/// Retrieve a legacy bank source's verification status.
pub async fn get_source(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(source_id): Path<String>,
) -> Result<Json<VerifySourceResponse>, ApiError> {
    let stripe = state.stripe()?;

    let source = stripe.get_source(&source_id).await?;

    Ok(Json(VerifySourceResponse {
        source_id: source.id,
        status: source.status,
    }))
}

/// Legacy source-verification request.
#[derive(Debug, Deserialize)]
pub struct VerifySourceRequest {
    /// The bank source to verify.
    pub source_id: String,
    /// The two micro-deposit amounts, in cents.
    pub amounts: [i64; 2],
}

/// Legacy source-verification response.
#[derive(Debug, Serialize)]
pub struct VerifySourceResponse {
    /// Source id.
    pub source_id: String,
    /// Source status after verification.
    pub status: String,
}

/// Verify a legacy bank source with micro-deposit amounts.
pub async fn verify_source(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(req): Json<VerifySourceRequest>,
) -> Result<Json<VerifySourceResponse>, ApiError> {
    let stripe = state.stripe()?;

    let source = stripe.verify_source(&req.source_id, req.amounts).await?;

    Ok(Json(VerifySourceResponse {
        source_id: source.id,
        status: source.status,
    }))
}
