//! Core types for the payrelay service.
//!
//! This crate provides the foundational types used throughout payrelay:
//!
//! - **Identifiers**: `UserId`, `RecordId`, `AdminId`, `CartId`
//! - **Statuses**: `PaymentStatus`, `CustomerStatus`
//! - **Records**: the five payment-record shapes, `Customer`, and the
//!   `PaymentRecord` capability they share
//! - **Routing**: `RoutingKey`, the decoded form of processor event metadata
//!
//! # Status codes
//!
//! Payment tables store a small integer status code:
//!
//! - `1` = pending / processing
//! - `2` = succeeded
//! - `3` = failed
//!
//! The commission table is the historical exception and stores the string
//! form (`"processing"` / `"succeeded"` / `"failed"`) instead.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod records;
pub mod routing;
pub mod status;

pub use ids::{AdminId, CartId, IdError, RecordId, UserId};
pub use records::{
    AdditionalCharge, CommissionPayment, Customer, Invoice, PaymentRecord, RecordKind,
    RequestPayment, RulePayment,
};
pub use routing::{CommissionPeriod, RoutingError, RoutingKey};
pub use status::{CustomerStatus, PaymentStatus};
