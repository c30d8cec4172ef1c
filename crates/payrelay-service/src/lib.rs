//! Payrelay HTTP Service.
//!
//! This crate provides the HTTP surface of the payment relay:
//!
//! - Relay endpoints that forward customer, bank-account-collection,
//!   payment, and subscription requests to the payment processor
//! - The processor webhook receiver: signature verification followed by
//!   reconciliation onto the payment-record tables
//!
//! # Authentication
//!
//! Relay endpoints are service-to-service only and authenticate with a
//! pre-shared API key. The webhook endpoint authenticates the caller by
//! verifying the processor's signature over the raw body.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Some handlers need async for consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod stripe;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use reconcile::Outcome;
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
