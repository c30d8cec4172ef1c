//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait. The payment tables are small (one row per order/request/period),
//! so the reconciliation lookups scan their column family and filter in
//! process rather than maintaining per-column indexes.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use payrelay_core::{
    AdditionalCharge, CartId, CommissionPayment, CommissionPeriod, Customer, Invoice,
    PaymentRecord, RecordId, RequestPayment, RulePayment, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{ReferenceMatch, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(column_families = all_column_families().len(), "RocksDB opened");

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Put one record under its big-endian record key.
    fn put_record<T: serde::Serialize>(&self, cf_name: &str, id: RecordId, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let encoded = Self::serialize(value)?;
        self.db
            .put_cf(&cf, keys::record_key(id), encoded)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Get one record by its big-endian record key.
    fn get_record<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        id: RecordId,
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, keys::record_key(id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Scan a column family, collecting every record the predicate accepts.
    fn scan<T, F>(&self, cf_name: &str, mut accept: F) -> Result<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let cf = self.cf(cf_name)?;
        let mut matches = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let record: T = Self::deserialize(&value)?;
            if accept(&record) {
                matches.push(record);
            }
        }

        Ok(matches)
    }

    /// Scan a column family, returning the first record the predicate accepts.
    fn scan_first<T, F>(&self, cf_name: &str, mut accept: F) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        let cf = self.cf(cf_name)?;

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let record: T = Self::deserialize(&value)?;
            if accept(&record) {
                return Ok(Some(record));
            }
        }

        Ok(None)
    }
}

/// Pick the most recently created record from a candidate set, breaking
/// timestamp ties on the higher record id.
fn newest<T, K>(candidates: Vec<T>, key: K) -> Option<T>
where
    K: Fn(&T) -> (DateTime<Utc>, RecordId),
{
    candidates.into_iter().max_by_key(|record| key(record))
}

impl Store for RocksStore {
    // =========================================================================
    // Customer Operations
    // =========================================================================

    fn put_customer(&self, customer: &Customer) -> Result<()> {
        let cf_customers = self.cf(cf::CUSTOMERS)?;
        let cf_index = self.cf(cf::CUSTOMERS_BY_SETUP_INTENT)?;

        let key = keys::customer_key(customer.user_id);
        let value = Self::serialize(customer)?;

        let mut batch = WriteBatch::default();

        // Re-point the setup-intent index when the reference changed.
        let previous = self.get_customer(customer.user_id)?;
        if let Some(old_si) = previous.and_then(|c| c.setup_intent_id) {
            if customer.setup_intent_id.as_deref() != Some(old_si.as_str()) {
                batch.delete_cf(&cf_index, keys::setup_intent_key(&old_si));
            }
        }

        batch.put_cf(&cf_customers, key, value);
        if let Some(si) = &customer.setup_intent_id {
            batch.put_cf(&cf_index, keys::setup_intent_key(si), key);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_customer(&self, user_id: UserId) -> Result<Option<Customer>> {
        let cf = self.cf(cf::CUSTOMERS)?;
        self.db
            .get_cf(&cf, keys::customer_key(user_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn find_customer_by_setup_intent(&self, setup_intent_id: &str) -> Result<Option<Customer>> {
        let cf_index = self.cf(cf::CUSTOMERS_BY_SETUP_INTENT)?;

        let Some(value) = self
            .db
            .get_cf(&cf_index, keys::setup_intent_key(setup_intent_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let Some(user_id) = keys::decode_user_id(&value) else {
            return Err(StoreError::Database(format!(
                "corrupt setup-intent index entry for {setup_intent_id}"
            )));
        };

        self.get_customer(user_id)
    }

    // =========================================================================
    // Invoice Operations
    // =========================================================================

    fn put_invoice(&self, invoice: &Invoice) -> Result<()> {
        self.put_record(cf::INVOICES, invoice.id, invoice)
    }

    fn get_invoice(&self, id: RecordId) -> Result<Option<Invoice>> {
        self.get_record(cf::INVOICES, id)
    }

    fn find_invoice_by_charge(&self, reference: &str) -> Result<Option<Invoice>> {
        self.scan_first(cf::INVOICES, |invoice: &Invoice| {
            invoice.charge_id.as_deref() == Some(reference)
        })
    }

    fn find_invoice_by_subscription_group(&self, group: &str) -> Result<Option<Invoice>> {
        self.scan_first(cf::INVOICES, |invoice: &Invoice| {
            invoice.subscription_group.as_deref() == Some(group)
        })
    }

    // =========================================================================
    // Rule Payment Operations
    // =========================================================================

    fn put_rule_payment(&self, payment: &RulePayment) -> Result<()> {
        self.put_record(cf::RULE_PAYMENTS, payment.id, payment)
    }

    fn get_rule_payment(&self, id: RecordId) -> Result<Option<RulePayment>> {
        self.get_record(cf::RULE_PAYMENTS, id)
    }

    fn get_rule_payments(&self, ids: &[RecordId]) -> Result<Vec<RulePayment>> {
        let mut payments = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(payment) = self.get_rule_payment(id)? {
                payments.push(payment);
            }
        }
        Ok(payments)
    }

    // =========================================================================
    // Request Payment Operations
    // =========================================================================

    fn put_request_payment(&self, payment: &RequestPayment) -> Result<()> {
        self.put_record(cf::REQUEST_PAYMENTS, payment.id, payment)
    }

    fn get_request_payment(&self, id: RecordId) -> Result<Option<RequestPayment>> {
        self.get_record(cf::REQUEST_PAYMENTS, id)
    }

    fn find_request_payment(
        &self,
        user_id: UserId,
        payment_ref: &str,
    ) -> Result<Option<RequestPayment>> {
        let candidates = self.scan(cf::REQUEST_PAYMENTS, |payment: &RequestPayment| {
            payment.user_id == user_id && payment.matches_reference(payment_ref)
        })?;

        Ok(newest(candidates, |p| (p.created_at, p.id)))
    }

    // =========================================================================
    // Additional Charge Operations
    // =========================================================================

    fn put_additional_charge(&self, charge: &AdditionalCharge) -> Result<()> {
        self.put_record(cf::ADDITIONAL_CHARGES, charge.id, charge)
    }

    fn get_additional_charge(&self, id: RecordId) -> Result<Option<AdditionalCharge>> {
        self.get_record(cf::ADDITIONAL_CHARGES, id)
    }

    fn find_additional_charge(
        &self,
        cart_id: Option<CartId>,
        user_id: UserId,
        payment_ref: &str,
    ) -> Result<Option<AdditionalCharge>> {
        let candidates = self.scan(cf::ADDITIONAL_CHARGES, |charge: &AdditionalCharge| {
            let keyed = match cart_id {
                Some(cart) => charge.cart_id == Some(cart),
                None => charge.user_id == user_id,
            };
            keyed && charge.matches_reference(payment_ref)
        })?;

        Ok(newest(candidates, |c| (c.created_at, c.id)))
    }

    // =========================================================================
    // Commission Operations
    // =========================================================================

    fn put_commission(&self, commission: &CommissionPayment) -> Result<()> {
        self.put_record(cf::COMMISSION_PAYMENTS, commission.id, commission)
    }

    fn get_commission(&self, id: RecordId) -> Result<Option<CommissionPayment>> {
        self.get_record(cf::COMMISSION_PAYMENTS, id)
    }

    fn find_commission_by_period(
        &self,
        period: CommissionPeriod,
    ) -> Result<Option<CommissionPayment>> {
        self.scan_first(cf::COMMISSION_PAYMENTS, |c: &CommissionPayment| {
            c.admin_id == period.admin_id && c.month == period.month && c.year == period.year
        })
    }

    fn find_commission_by_reference(
        &self,
        payment_ref: &str,
    ) -> Result<Option<CommissionPayment>> {
        self.scan_first(cf::COMMISSION_PAYMENTS, |c: &CommissionPayment| {
            c.txt_id.as_deref() == Some(payment_ref)
        })
    }

    // =========================================================================
    // Reverse Lookup
    // =========================================================================

    fn find_by_reference(&self, payment_ref: &str) -> Result<Option<ReferenceMatch>> {
        // Fixed priority order; first match wins.
        if let Some(invoice) = self.find_invoice_by_charge(payment_ref)? {
            return Ok(Some(ReferenceMatch::Invoice(invoice)));
        }
        if let Some(payment) = self.scan_first(cf::RULE_PAYMENTS, |p: &RulePayment| {
            p.txt_id.as_deref() == Some(payment_ref)
        })? {
            return Ok(Some(ReferenceMatch::RulePayment(payment)));
        }
        if let Some(payment) = self.scan_first(cf::REQUEST_PAYMENTS, |p: &RequestPayment| {
            p.stripe_pay_id.as_deref() == Some(payment_ref)
        })? {
            return Ok(Some(ReferenceMatch::RequestPayment(payment)));
        }
        if let Some(charge) = self.scan_first(cf::ADDITIONAL_CHARGES, |c: &AdditionalCharge| {
            c.charge_id.as_deref() == Some(payment_ref)
        })? {
            return Ok(Some(ReferenceMatch::AdditionalCharge(charge)));
        }
        if let Some(commission) = self.find_commission_by_reference(payment_ref)? {
            return Ok(Some(ReferenceMatch::Commission(commission)));
        }

        Ok(None)
    }

    // =========================================================================
    // Processed-Event Ledger
    // =========================================================================

    fn insert_processed_event(&self, event_id: &str, created_at: DateTime<Utc>) -> Result<bool> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;
        let key = keys::processed_event_key(event_id);

        let exists = self
            .db
            .get_cf(&cf, &key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if exists {
            return Ok(false);
        }

        let value = Self::serialize(&created_at)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    fn has_processed_event(&self, event_id: &str) -> Result<bool> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;
        Ok(self
            .db
            .get_cf(&cf, keys::processed_event_key(event_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some())
    }

    fn prune_processed_events(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;

        let mut expired = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let created_at: DateTime<Utc> = Self::deserialize(&value)?;
            if created_at < cutoff {
                expired.push(key);
            }
        }

        let removed = expired.len();
        if removed > 0 {
            let mut batch = WriteBatch::default();
            for key in expired {
                batch.delete_cf(&cf, key);
            }
            self.db
                .write(batch)
                .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        Ok(removed)
    }
}
