//! Database schema definitions and column families.
//!
//! One column family per application table, plus the processed-event ledger
//! and the setup-intent index.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Customer records, keyed by `user_id`.
    pub const CUSTOMERS: &str = "customers";

    /// Index: `setup_intent_id` → `user_id`. Value is the big-endian user id.
    pub const CUSTOMERS_BY_SETUP_INTENT: &str = "customers_by_setup_intent";

    /// Subscription invoices, keyed by record id.
    pub const INVOICES: &str = "invoices";

    /// Rule/batch payments, keyed by record id.
    pub const RULE_PAYMENTS: &str = "rule_payments";

    /// Request payments, keyed by record id.
    pub const REQUEST_PAYMENTS: &str = "request_payments";

    /// Additional charges, keyed by record id.
    pub const ADDITIONAL_CHARGES: &str = "additional_charges";

    /// Commission (cronside) payments, keyed by record id.
    pub const COMMISSION_PAYMENTS: &str = "commission_payments";

    /// Processed webhook events, keyed by processor event id. Value is the
    /// event's created timestamp, used by the retention prune.
    pub const PROCESSED_EVENTS: &str = "processed_events";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::CUSTOMERS,
        cf::CUSTOMERS_BY_SETUP_INTENT,
        cf::INVOICES,
        cf::RULE_PAYMENTS,
        cf::REQUEST_PAYMENTS,
        cf::ADDITIONAL_CHARGES,
        cf::COMMISSION_PAYMENTS,
        cf::PROCESSED_EVENTS,
    ]
}
