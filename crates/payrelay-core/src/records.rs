//! Payment-record shapes and the capability they share.
//!
//! Five tables store payment attempts, each predating the others and each
//! naming its columns differently. The processor reference lives under
//! `charge_id`, `txt_id`, or `stripe_pay_id` depending on the table, and the
//! commission table stores its status as a string where every other table
//! stores an integer code. Those names and types are part of the existing
//! store contract and are preserved here verbatim.
//!
//! The [`PaymentRecord`] trait is the abstraction over that mess: one update
//! shape (reference + status + snapshot), five column mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{AdminId, CartId, RecordId, UserId};
use crate::status::{CustomerStatus, PaymentStatus};

/// Which payment table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Subscription invoice.
    Invoice,
    /// Rule/batch payment.
    RulePayment,
    /// Request payment.
    RequestPayment,
    /// Additional charge.
    AdditionalCharge,
    /// Commission (cronside) payment.
    Commission,
}

impl RecordKind {
    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::RulePayment => "rule_payment",
            Self::RequestPayment => "request_payment",
            Self::AdditionalCharge => "additional_charge",
            Self::Commission => "commission_payment",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The update capability every payment table supports.
///
/// The webhook path only ever mutates three things on a record: the stored
/// processor reference, the status, and the raw snapshot of the last-seen
/// processor object. Implementations map those onto their table's columns.
pub trait PaymentRecord {
    /// The table this record belongs to.
    fn kind(&self) -> RecordKind;

    /// Row identifier.
    fn record_id(&self) -> RecordId;

    /// The stored processor reference, if any.
    fn reference(&self) -> Option<&str>;

    /// Overwrite the stored processor reference.
    fn set_reference(&mut self, reference: String);

    /// Overwrite the status.
    fn set_status(&mut self, status: PaymentStatus);

    /// Overwrite the raw processor-object snapshot.
    fn set_snapshot(&mut self, snapshot: serde_json::Value);

    /// Bump the record's `updated_at` timestamp.
    fn touch(&mut self);

    /// Whether this record can be claimed by an event carrying `candidate`
    /// as its processor id: the stored reference is absent, empty, or equal.
    fn matches_reference(&self, candidate: &str) -> bool {
        match self.reference() {
            None => true,
            Some(stored) => stored.is_empty() || stored == candidate,
        }
    }

    /// Apply a reconciliation update in one step.
    fn apply(&mut self, reference: &str, status: PaymentStatus, snapshot: serde_json::Value) {
        self.set_reference(reference.to_string());
        self.set_status(status);
        self.set_snapshot(snapshot);
        self.touch();
    }
}

/// A subscription invoice row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Row id.
    pub id: RecordId,
    /// Identifier linking the invoice to its subscription group.
    pub subscription_group: Option<String>,
    /// Processor reference (this table's historical column name).
    pub charge_id: Option<String>,
    /// Raw snapshot of the last-seen processor object.
    pub response: serde_json::Value,
    /// Integer status code (1/2/3).
    pub status: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a fresh invoice row in the pending state.
    #[must_use]
    pub fn new(id: RecordId) -> Self {
        let now = Utc::now();
        Self {
            id,
            subscription_group: None,
            charge_id: None,
            response: serde_json::Value::Null,
            status: PaymentStatus::Processing.code(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl PaymentRecord for Invoice {
    fn kind(&self) -> RecordKind {
        RecordKind::Invoice
    }

    fn record_id(&self) -> RecordId {
        self.id
    }

    fn reference(&self) -> Option<&str> {
        self.charge_id.as_deref()
    }

    fn set_reference(&mut self, reference: String) {
        self.charge_id = Some(reference);
    }

    fn set_status(&mut self, status: PaymentStatus) {
        self.status = status.code();
    }

    fn set_snapshot(&mut self, snapshot: serde_json::Value) {
        self.response = snapshot;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A rule (batch) payment row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePayment {
    /// Row id.
    pub id: RecordId,
    /// Processor reference (this table's historical column name).
    pub txt_id: Option<String>,
    /// Raw snapshot of the last-seen processor object.
    pub response: serde_json::Value,
    /// Integer status code (1/2/3).
    pub status: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl RulePayment {
    /// Create a fresh rule-payment row in the pending state.
    #[must_use]
    pub fn new(id: RecordId) -> Self {
        let now = Utc::now();
        Self {
            id,
            txt_id: None,
            response: serde_json::Value::Null,
            status: PaymentStatus::Processing.code(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl PaymentRecord for RulePayment {
    fn kind(&self) -> RecordKind {
        RecordKind::RulePayment
    }

    fn record_id(&self) -> RecordId {
        self.id
    }

    fn reference(&self) -> Option<&str> {
        self.txt_id.as_deref()
    }

    fn set_reference(&mut self, reference: String) {
        self.txt_id = Some(reference);
    }

    fn set_status(&mut self, status: PaymentStatus) {
        self.status = status.code();
    }

    fn set_snapshot(&mut self, snapshot: serde_json::Value) {
        self.response = snapshot;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A request-payment row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayment {
    /// Row id.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Processor reference (this table's historical column name).
    pub stripe_pay_id: Option<String>,
    /// Raw snapshot of the last-seen processor object.
    pub response: serde_json::Value,
    /// Integer status code (1/2/3).
    pub status: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl RequestPayment {
    /// Create a fresh request-payment row in the pending state.
    #[must_use]
    pub fn new(id: RecordId, user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            stripe_pay_id: None,
            response: serde_json::Value::Null,
            status: PaymentStatus::Processing.code(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl PaymentRecord for RequestPayment {
    fn kind(&self) -> RecordKind {
        RecordKind::RequestPayment
    }

    fn record_id(&self) -> RecordId {
        self.id
    }

    fn reference(&self) -> Option<&str> {
        self.stripe_pay_id.as_deref()
    }

    fn set_reference(&mut self, reference: String) {
        self.stripe_pay_id = Some(reference);
    }

    fn set_status(&mut self, status: PaymentStatus) {
        self.status = status.code();
    }

    fn set_snapshot(&mut self, snapshot: serde_json::Value) {
        self.response = snapshot;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// An additional-charge row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalCharge {
    /// Row id.
    pub id: RecordId,
    /// Owning user.
    pub user_id: UserId,
    /// Cart the charge was raised against, when there was one.
    pub cart_id: Option<CartId>,
    /// Processor reference (this table's historical column name).
    pub charge_id: Option<String>,
    /// Raw snapshot of the last-seen processor object.
    pub response: serde_json::Value,
    /// Integer status code (1/2/3).
    pub status: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl AdditionalCharge {
    /// Create a fresh additional-charge row in the pending state.
    #[must_use]
    pub fn new(id: RecordId, user_id: UserId, cart_id: Option<CartId>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            cart_id,
            charge_id: None,
            response: serde_json::Value::Null,
            status: PaymentStatus::Processing.code(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl PaymentRecord for AdditionalCharge {
    fn kind(&self) -> RecordKind {
        RecordKind::AdditionalCharge
    }

    fn record_id(&self) -> RecordId {
        self.id
    }

    fn reference(&self) -> Option<&str> {
        self.charge_id.as_deref()
    }

    fn set_reference(&mut self, reference: String) {
        self.charge_id = Some(reference);
    }

    fn set_status(&mut self, status: PaymentStatus) {
        self.status = status.code();
    }

    fn set_snapshot(&mut self, snapshot: serde_json::Value) {
        self.response = snapshot;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A commission (cronside) payment row.
///
/// Keyed by `(admin_id, month, year)`. The status column is a string, not a
/// code, and the row additionally stores the settlement/balance-transaction
/// reference when one is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionPayment {
    /// Row id.
    pub id: RecordId,
    /// Admin the commission is owed to.
    pub admin_id: AdminId,
    /// Commission month (1-12).
    pub month: u32,
    /// Commission year.
    pub year: i32,
    /// Processor reference (this table's historical column name).
    pub txt_id: Option<String>,
    /// Balance/settlement transaction reference, when known.
    pub balance_id: Option<String>,
    /// Raw snapshot of the last-seen processor object.
    pub response: serde_json::Value,
    /// String status (`"processing"` / `"succeeded"` / `"failed"`).
    pub status: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl CommissionPayment {
    /// Create a fresh commission row in the processing state.
    #[must_use]
    pub fn new(id: RecordId, admin_id: AdminId, month: u32, year: i32) -> Self {
        let now = Utc::now();
        Self {
            id,
            admin_id,
            month,
            year,
            txt_id: None,
            balance_id: None,
            response: serde_json::Value::Null,
            status: PaymentStatus::Processing.as_str().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl PaymentRecord for CommissionPayment {
    fn kind(&self) -> RecordKind {
        RecordKind::Commission
    }

    fn record_id(&self) -> RecordId {
        self.id
    }

    fn reference(&self) -> Option<&str> {
        self.txt_id.as_deref()
    }

    fn set_reference(&mut self, reference: String) {
        self.txt_id = Some(reference);
    }

    fn set_status(&mut self, status: PaymentStatus) {
        self.status = status.as_str().to_string();
    }

    fn set_snapshot(&mut self, snapshot: serde_json::Value) {
        self.response = snapshot;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A customer row holding the processor-side references for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Owning user.
    pub user_id: UserId,
    /// Processor customer id.
    pub customer_id: Option<String>,
    /// Setup intent currently/last used to collect a payment method.
    pub setup_intent_id: Option<String>,
    /// Collected payment method, once verification succeeds.
    pub payment_method_id: Option<String>,
    /// Verification status.
    pub status: CustomerStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Create a fresh customer row.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            customer_id: None,
            setup_intent_id: None,
            payment_method_id: None,
            status: CustomerStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the outcome of a finished bank-account collection flow.
    pub fn mark_verification(&mut self, status: CustomerStatus, payment_method: Option<String>) {
        self.status = status;
        if payment_method.is_some() {
            self.payment_method_id = payment_method;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn apply_sets_reference_status_and_snapshot() {
        let mut invoice = Invoice::new(RecordId::new(1));
        invoice.apply("pi_123", PaymentStatus::Succeeded, json!({"id": "pi_123"}));

        assert_eq!(invoice.charge_id.as_deref(), Some("pi_123"));
        assert_eq!(invoice.status, 2);
        assert_eq!(invoice.response["id"], "pi_123");
    }

    #[test]
    fn commission_stores_string_status() {
        let mut commission = CommissionPayment::new(RecordId::new(1), AdminId::new(3), 5, 2024);
        commission.set_status(PaymentStatus::Processing);
        assert_eq!(commission.status, "processing");

        commission.set_status(PaymentStatus::Failed);
        assert_eq!(commission.status, "failed");
    }

    #[test]
    fn reference_columns_differ_per_table() {
        let mut rule = RulePayment::new(RecordId::new(9));
        rule.set_reference("pi_abc".into());
        assert_eq!(rule.txt_id.as_deref(), Some("pi_abc"));

        let mut request = RequestPayment::new(RecordId::new(4), UserId::new(42));
        request.set_reference("pi_abc".into());
        assert_eq!(request.stripe_pay_id.as_deref(), Some("pi_abc"));
    }

    #[test]
    fn matches_reference_on_empty_or_equal() {
        let mut request = RequestPayment::new(RecordId::new(4), UserId::new(42));
        assert!(request.matches_reference("pi_a"));

        request.stripe_pay_id = Some(String::new());
        assert!(request.matches_reference("pi_a"));

        request.stripe_pay_id = Some("pi_a".into());
        assert!(request.matches_reference("pi_a"));
        assert!(!request.matches_reference("pi_b"));
    }

    #[test]
    fn customer_verification_keeps_existing_payment_method_on_failure() {
        let mut customer = Customer::new(UserId::new(42));
        customer.mark_verification(CustomerStatus::Verified, Some("pm_1".into()));
        assert_eq!(customer.status, CustomerStatus::Verified);

        customer.mark_verification(CustomerStatus::Failed, None);
        assert_eq!(customer.status, CustomerStatus::Failed);
        assert_eq!(customer.payment_method_id.as_deref(), Some("pm_1"));
    }
}
