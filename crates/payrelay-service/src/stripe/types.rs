//! Processor API types.
//!
//! Only the fields this service reads are modeled; everything else in a
//! processor response is ignored on deserialization.

use serde::Deserialize;

use payrelay_core::routing::Metadata;

/// Processor customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Processor customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
    /// Customer name.
    #[serde(default)]
    pub name: Option<String>,
    /// Metadata attached to the customer.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Processor setup-intent object (bank-account collection flow).
#[derive(Debug, Clone, Deserialize)]
pub struct SetupIntent {
    /// Setup intent ID.
    pub id: String,
    /// Status (`requires_payment_method`, `succeeded`, ...).
    #[serde(default)]
    pub status: String,
    /// Customer the intent belongs to.
    #[serde(default)]
    pub customer: Option<String>,
    /// Collected payment method, once present.
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Client secret for completing collection on the caller's side.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Processor payment-intent object.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    /// Payment intent ID.
    pub id: String,
    /// Amount in the smallest currency unit.
    #[serde(default)]
    pub amount: i64,
    /// Currency (e.g., "usd").
    #[serde(default)]
    pub currency: String,
    /// Status (succeeded, processing, requires_action, ...).
    #[serde(default)]
    pub status: String,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
    /// Most recent charge created by this intent.
    #[serde(default)]
    pub latest_charge: Option<String>,
    /// Metadata (the routing key lives here).
    #[serde(default)]
    pub metadata: Metadata,
}

/// Processor payment-method object.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethod {
    /// Payment method ID.
    pub id: String,
    /// Method type (e.g., "us_bank_account").
    #[serde(rename = "type", default)]
    pub method_type: String,
    /// Bank-account details, when the method is a bank account.
    #[serde(default)]
    pub us_bank_account: Option<serde_json::Value>,
}

/// Processor charge object.
#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    /// Charge ID.
    pub id: String,
    /// Status (pending, succeeded, failed).
    #[serde(default)]
    pub status: String,
    /// Invoice reference, for subscription-driven charges.
    #[serde(default)]
    pub invoice: Option<String>,
    /// Payment intent that created the charge.
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Balance/settlement transaction reference.
    #[serde(default)]
    pub balance_transaction: Option<String>,
    /// Metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Processor price object.
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID.
    pub id: String,
    /// Amount in the smallest currency unit.
    #[serde(default)]
    pub unit_amount: Option<i64>,
    /// Currency.
    #[serde(default)]
    pub currency: String,
}

/// Processor subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Status (active, canceled, ...).
    #[serde(default)]
    pub status: String,
    /// Customer ID.
    #[serde(default)]
    pub customer: Option<String>,
}

/// Legacy bank-account token.
#[derive(Debug, Clone, Deserialize)]
pub struct BankToken {
    /// Token ID.
    pub id: String,
    /// The tokenized bank account.
    #[serde(default)]
    pub bank_account: Option<serde_json::Value>,
}

/// Legacy bank source (micro-deposit verification flow).
#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    /// Source ID.
    pub id: String,
    /// Status (`new`, `verified`, `verification_failed`, ...).
    #[serde(default)]
    pub status: String,
}

/// Verified webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "payment_intent.succeeded").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
    /// Event data.
    pub data: WebhookEventData,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object, left opaque until the reconciler knows its shape.
    pub object: serde_json::Value,
}

/// Processor error response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// The error payload.
    pub error: StripeErrorBody,
}

/// Processor error payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    /// Error type.
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Machine-readable code.
    #[serde(default)]
    pub code: Option<String>,
}
