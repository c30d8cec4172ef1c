//! `RocksDB` storage layer for payrelay.
//!
//! This crate persists the payment-record tables the webhook path
//! reconciles against, using `RocksDB` with one column family per table.
//!
//! # Architecture
//!
//! - `customers`: customer records, keyed by `user_id`
//! - `customers_by_setup_intent`: index for resolving setup-intent events
//! - `invoices`, `rule_payments`, `request_payments`, `additional_charges`,
//!   `commission_payments`: the five payment tables, keyed by record id
//! - `processed_events`: webhook redelivery ledger, keyed by event id
//!
//! Records are created by the surrounding application; the webhook path
//! only mutates status/reference/snapshot fields. No transaction wraps a
//! lookup-then-update sequence, so concurrent deliveries racing on one
//! record are last-writer-wins.
//!
//! # Example
//!
//! ```no_run
//! use payrelay_core::{Invoice, RecordId};
//! use payrelay_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/payrelay-db").unwrap();
//!
//! let invoice = Invoice::new(RecordId::new(7));
//! store.put_invoice(&invoice).unwrap();
//!
//! let found = store.get_invoice(RecordId::new(7)).unwrap();
//! assert!(found.is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use payrelay_core::{
    AdditionalCharge, CartId, CommissionPayment, CommissionPeriod, Customer, Invoice, RecordId,
    RecordKind, RequestPayment, RulePayment, UserId,
};

/// A record found by the reverse reference lookup, tagged with its table.
#[derive(Debug, Clone)]
pub enum ReferenceMatch {
    /// Found in the invoice table.
    Invoice(Invoice),
    /// Found in the rule-payment table.
    RulePayment(RulePayment),
    /// Found in the request-payment table.
    RequestPayment(RequestPayment),
    /// Found in the additional-charge table.
    AdditionalCharge(AdditionalCharge),
    /// Found in the commission table.
    Commission(CommissionPayment),
}

impl ReferenceMatch {
    /// The table the match came from.
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Invoice(_) => RecordKind::Invoice,
            Self::RulePayment(_) => RecordKind::RulePayment,
            Self::RequestPayment(_) => RecordKind::RequestPayment,
            Self::AdditionalCharge(_) => RecordKind::AdditionalCharge,
            Self::Commission(_) => RecordKind::Commission,
        }
    }
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer so handlers and tests depend on
/// the operations, not on `RocksDB`.
pub trait Store: Send + Sync {
    // =========================================================================
    // Customer Operations
    // =========================================================================

    /// Insert or update a customer record, maintaining the setup-intent index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_customer(&self, customer: &Customer) -> Result<()>;

    /// Get a customer by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_customer(&self, user_id: UserId) -> Result<Option<Customer>>;

    /// Resolve a setup-intent reference to the customer that owns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_customer_by_setup_intent(&self, setup_intent_id: &str) -> Result<Option<Customer>>;

    // =========================================================================
    // Invoice Operations
    // =========================================================================

    /// Insert or update an invoice.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_invoice(&self, invoice: &Invoice) -> Result<()>;

    /// Get an invoice by record id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_invoice(&self, id: RecordId) -> Result<Option<Invoice>>;

    /// Find the invoice whose stored charge reference equals `reference`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_invoice_by_charge(&self, reference: &str) -> Result<Option<Invoice>>;

    /// Find the invoice linked to `subscription_group`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_invoice_by_subscription_group(&self, group: &str) -> Result<Option<Invoice>>;

    // =========================================================================
    // Rule Payment Operations
    // =========================================================================

    /// Insert or update a rule payment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_rule_payment(&self, payment: &RulePayment) -> Result<()>;

    /// Get a rule payment by record id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_rule_payment(&self, id: RecordId) -> Result<Option<RulePayment>>;

    /// Get every rule payment whose id appears in `ids`, in store order.
    /// Missing ids are skipped, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_rule_payments(&self, ids: &[RecordId]) -> Result<Vec<RulePayment>>;

    // =========================================================================
    // Request Payment Operations
    // =========================================================================

    /// Insert or update a request payment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_request_payment(&self, payment: &RequestPayment) -> Result<()>;

    /// Get a request payment by record id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_request_payment(&self, id: RecordId) -> Result<Option<RequestPayment>>;

    /// Find the user's claimable request payment: stored reference empty or
    /// equal to `payment_ref`, most recently created wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_request_payment(
        &self,
        user_id: UserId,
        payment_ref: &str,
    ) -> Result<Option<RequestPayment>>;

    // =========================================================================
    // Additional Charge Operations
    // =========================================================================

    /// Insert or update an additional charge.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_additional_charge(&self, charge: &AdditionalCharge) -> Result<()>;

    /// Get an additional charge by record id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_additional_charge(&self, id: RecordId) -> Result<Option<AdditionalCharge>>;

    /// Find the claimable additional charge, keyed by cart when `cart_id`
    /// is present, else by user. Same selection rule as
    /// [`Store::find_request_payment`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_additional_charge(
        &self,
        cart_id: Option<CartId>,
        user_id: UserId,
        payment_ref: &str,
    ) -> Result<Option<AdditionalCharge>>;

    // =========================================================================
    // Commission Operations
    // =========================================================================

    /// Insert or update a commission payment.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_commission(&self, commission: &CommissionPayment) -> Result<()>;

    /// Get a commission payment by record id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_commission(&self, id: RecordId) -> Result<Option<CommissionPayment>>;

    /// Find the commission row for a composite `(admin, month, year)` key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_commission_by_period(
        &self,
        period: CommissionPeriod,
    ) -> Result<Option<CommissionPayment>>;

    /// Find the commission row whose stored reference equals `payment_ref`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_commission_by_reference(&self, payment_ref: &str)
        -> Result<Option<CommissionPayment>>;

    // =========================================================================
    // Reverse Lookup
    // =========================================================================

    /// Search every table's stored-reference column for `payment_ref`, in
    /// fixed priority order: invoice, rule payment, request payment,
    /// additional charge, commission. First match wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_by_reference(&self, payment_ref: &str) -> Result<Option<ReferenceMatch>>;

    // =========================================================================
    // Processed-Event Ledger
    // =========================================================================

    /// Record an event id as processed. Returns `false` (and writes
    /// nothing) when the id is already in the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_processed_event(&self, event_id: &str, created_at: DateTime<Utc>) -> Result<bool>;

    /// Whether an event id is already in the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn has_processed_event(&self, event_id: &str) -> Result<bool>;

    /// Delete ledger entries whose event timestamp is older than `cutoff`.
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn prune_processed_events(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
