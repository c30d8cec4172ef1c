//! Payment processor integration (Stripe-shaped API).
//!
//! - [`client`]: the outbound API client the relay endpoints call
//! - [`types`]: processor object types shared by the client and the webhook
//!   path
//! - [`webhook`]: the inbound event verifier

pub mod client;
pub mod types;
pub mod webhook;

pub use client::{PaymentIntentParams, StripeClient, StripeError};
pub use types::{
    BankToken, Charge, Customer, PaymentIntent, PaymentMethod, Price, SetupIntent, Source,
    Subscription, WebhookEvent,
};
pub use webhook::{construct_event, WebhookError};
