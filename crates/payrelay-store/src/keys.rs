//! Key encoding utilities for `RocksDB`.
//!
//! Record ids are assigned by the surrounding application as increasing
//! integers, so keys use the big-endian encoding: iteration order matches
//! id order, which the reconciliation lookups rely on.

use payrelay_core::{RecordId, UserId};

/// Create a record key from a record id.
#[must_use]
pub fn record_key(id: RecordId) -> [u8; 8] {
    id.to_be_bytes()
}

/// Create a customer key from a user id.
#[must_use]
pub fn customer_key(user_id: UserId) -> [u8; 8] {
    user_id.to_be_bytes()
}

/// Create a setup-intent index key.
#[must_use]
pub fn setup_intent_key(setup_intent_id: &str) -> Vec<u8> {
    setup_intent_id.as_bytes().to_vec()
}

/// Create a processed-event ledger key.
#[must_use]
pub fn processed_event_key(event_id: &str) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}

/// Decode a user id from a setup-intent index value.
///
/// Returns `None` if the value is not exactly 8 bytes.
#[must_use]
pub fn decode_user_id(value: &[u8]) -> Option<UserId> {
    let bytes: [u8; 8] = value.try_into().ok()?;
    Some(UserId::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keys_sort_by_id() {
        assert!(record_key(RecordId::new(7)) < record_key(RecordId::new(8)));
        assert!(record_key(RecordId::new(8)) < record_key(RecordId::new(100)));
    }

    #[test]
    fn user_id_index_value_roundtrip() {
        let user_id = UserId::new(42);
        let value = customer_key(user_id);
        assert_eq!(decode_user_id(&value), Some(user_id));
    }

    #[test]
    fn decode_user_id_rejects_bad_lengths() {
        assert_eq!(decode_user_id(&[1, 2, 3]), None);
        assert_eq!(decode_user_id(&[]), None);
    }
}
