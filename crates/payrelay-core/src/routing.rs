//! Routing-key decoding for processor event metadata.
//!
//! Callers attach free-form string metadata to every payment intent they
//! create, and the webhook path reads it back to decide which table an event
//! belongs to. The conventions (`order_type`, `order_id = "<ids>|<user>"`,
//! the commission composite key) are an informally-typed tagged union, so
//! this module decodes them into an explicit one, exactly once, at the
//! boundary. Metadata that names a convention but breaks its shape is a
//! loud [`RoutingError`], never a silent fallthrough; *absent* metadata is
//! legal and resolves to [`RoutingKey::Reference`].

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::ids::{AdminId, CartId, RecordId, UserId};

/// Event metadata as delivered by the processor: string keys, string values.
pub type Metadata = BTreeMap<String, String>;

/// The composite key identifying one commission row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionPeriod {
    /// Admin the commission is owed to.
    pub admin_id: AdminId,
    /// Commission month (1-12).
    pub month: u32,
    /// Commission year.
    pub year: i32,
}

/// Where a payment-intent event should be reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingKey {
    /// `order_type = "request_payment"`: the user's open request payment.
    RequestPayment {
        /// User whose request payment is being settled.
        user_id: UserId,
    },
    /// `order_type = "additional_charge"`: keyed by cart when present,
    /// else by user.
    AdditionalCharge {
        /// User the charge belongs to.
        user_id: UserId,
        /// Cart the charge was raised against, when present.
        cart_id: Option<CartId>,
    },
    /// `order_type = "commission_payment"`: by composite period key when
    /// all three parts are present, else by stored processor reference.
    Commission {
        /// The composite key, when the metadata carried a complete one.
        period: Option<CommissionPeriod>,
    },
    /// No `order_type`, `order_id = "<ids>|<user>"`: invoice or rule
    /// payments named explicitly.
    Order {
        /// One id routes to the invoice table (rule payment as fallback);
        /// several route to a bulk rule-payment update.
        invoice_ids: Vec<RecordId>,
        /// User the order belongs to.
        user_id: UserId,
    },
    /// No routing hints at all: reverse lookup by stored processor
    /// reference across every table.
    Reference,
}

/// Malformed routing metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// `order_type` carried a value no convention defines.
    #[error("unrecognized order_type: {0:?}")]
    UnknownOrderType(String),

    /// A convention requires a key the metadata did not carry.
    #[error("order_type {order_type:?} requires metadata key {key:?}")]
    MissingKey {
        /// The convention in play.
        order_type: &'static str,
        /// The key it requires.
        key: &'static str,
    },

    /// A metadata value failed to parse as the expected integer.
    #[error("metadata key {key:?} has non-numeric value {value:?}")]
    InvalidValue {
        /// The offending key.
        key: &'static str,
        /// The raw value.
        value: String,
    },

    /// `order_id` did not match `"<ids>|<user_id>"`.
    #[error("malformed order_id: {0:?}")]
    MalformedOrderId(String),

    /// The commission composite key was only partially present.
    #[error("commission_payment metadata carries a partial admin_id/month/year key")]
    PartialCommissionPeriod,
}

/// Decode routing metadata into an explicit key.
///
/// # Errors
///
/// Returns a [`RoutingError`] when metadata names a convention but violates
/// its shape. Metadata with no routing hints at all is not an error.
pub fn decode(metadata: &Metadata) -> Result<RoutingKey, RoutingError> {
    // An empty order_type is treated the same as an absent one.
    let order_type = metadata
        .get("order_type")
        .map(String::as_str)
        .filter(|s| !s.is_empty());

    match order_type {
        Some("request_payment") => Ok(RoutingKey::RequestPayment {
            user_id: require_id(metadata, "request_payment", "user_id")?,
        }),
        Some("additional_charge") => {
            let user_id = require_id(metadata, "additional_charge", "user_id")?;
            let cart_id = optional_id::<CartId>(metadata, "cart_id")?;
            Ok(RoutingKey::AdditionalCharge { user_id, cart_id })
        }
        Some("commission_payment") => decode_commission(metadata),
        Some(other) => Err(RoutingError::UnknownOrderType(other.to_string())),
        None => match metadata.get("order_id").filter(|s| !s.is_empty()) {
            Some(order_id) => decode_order_id(order_id),
            None => Ok(RoutingKey::Reference),
        },
    }
}

fn decode_commission(metadata: &Metadata) -> Result<RoutingKey, RoutingError> {
    let admin = metadata.get("admin_id").filter(|s| !s.is_empty());
    let month = metadata.get("month").filter(|s| !s.is_empty());
    let year = metadata.get("year").filter(|s| !s.is_empty());

    let period = match (admin, month, year) {
        (Some(admin), Some(month), Some(year)) => Some(CommissionPeriod {
            admin_id: parse_value("admin_id", admin)?,
            month: month
                .trim()
                .parse()
                .map_err(|_| RoutingError::InvalidValue {
                    key: "month",
                    value: month.clone(),
                })?,
            year: year.trim().parse().map_err(|_| RoutingError::InvalidValue {
                key: "year",
                value: year.clone(),
            })?,
        }),
        (None, None, None) => None,
        _ => return Err(RoutingError::PartialCommissionPeriod),
    };

    Ok(RoutingKey::Commission { period })
}

/// Parse `"<ids>|<user_id>"` where `<ids>` is one id or a comma-separated
/// list.
fn decode_order_id(order_id: &str) -> Result<RoutingKey, RoutingError> {
    let malformed = || RoutingError::MalformedOrderId(order_id.to_string());

    let (ids_part, user_part) = order_id.split_once('|').ok_or_else(malformed)?;
    if ids_part.is_empty() || user_part.is_empty() || user_part.contains('|') {
        return Err(malformed());
    }

    let invoice_ids = ids_part
        .split(',')
        .map(|id| id.trim().parse::<RecordId>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed())?;
    let user_id = user_part.trim().parse().map_err(|_| malformed())?;

    Ok(RoutingKey::Order {
        invoice_ids,
        user_id,
    })
}

fn require_id<T: FromStr>(
    metadata: &Metadata,
    order_type: &'static str,
    key: &'static str,
) -> Result<T, RoutingError> {
    let value = metadata
        .get(key)
        .filter(|s| !s.is_empty())
        .ok_or(RoutingError::MissingKey { order_type, key })?;
    parse_value(key, value)
}

fn optional_id<T: FromStr>(metadata: &Metadata, key: &'static str) -> Result<Option<T>, RoutingError> {
    metadata
        .get(key)
        .filter(|s| !s.is_empty())
        .map(|value| parse_value(key, value))
        .transpose()
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, RoutingError> {
    value.trim().parse().map_err(|_| RoutingError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn request_payment_requires_user_id() {
        let key = decode(&meta(&[("order_type", "request_payment"), ("user_id", "42")])).unwrap();
        assert_eq!(
            key,
            RoutingKey::RequestPayment {
                user_id: UserId::new(42)
            }
        );

        let err = decode(&meta(&[("order_type", "request_payment")])).unwrap_err();
        assert_eq!(
            err,
            RoutingError::MissingKey {
                order_type: "request_payment",
                key: "user_id"
            }
        );
    }

    #[test]
    fn additional_charge_cart_is_optional() {
        let key = decode(&meta(&[
            ("order_type", "additional_charge"),
            ("user_id", "42"),
            ("cart_id", "9"),
        ]))
        .unwrap();
        assert_eq!(
            key,
            RoutingKey::AdditionalCharge {
                user_id: UserId::new(42),
                cart_id: Some(CartId::new(9)),
            }
        );

        let key = decode(&meta(&[
            ("order_type", "additional_charge"),
            ("user_id", "42"),
        ]))
        .unwrap();
        assert_eq!(
            key,
            RoutingKey::AdditionalCharge {
                user_id: UserId::new(42),
                cart_id: None,
            }
        );
    }

    #[test]
    fn commission_with_full_period() {
        let key = decode(&meta(&[
            ("order_type", "commission_payment"),
            ("admin_id", "3"),
            ("month", "5"),
            ("year", "2024"),
        ]))
        .unwrap();
        assert_eq!(
            key,
            RoutingKey::Commission {
                period: Some(CommissionPeriod {
                    admin_id: AdminId::new(3),
                    month: 5,
                    year: 2024,
                })
            }
        );
    }

    #[test]
    fn commission_without_period_falls_back_to_reference_lookup() {
        let key = decode(&meta(&[("order_type", "commission_payment")])).unwrap();
        assert_eq!(key, RoutingKey::Commission { period: None });
    }

    #[test]
    fn commission_with_partial_period_is_rejected() {
        let err = decode(&meta(&[
            ("order_type", "commission_payment"),
            ("admin_id", "3"),
            ("month", "5"),
        ]))
        .unwrap_err();
        assert_eq!(err, RoutingError::PartialCommissionPeriod);
    }

    #[test]
    fn unknown_order_type_is_rejected() {
        let err = decode(&meta(&[("order_type", "gift_card")])).unwrap_err();
        assert_eq!(err, RoutingError::UnknownOrderType("gift_card".into()));
    }

    #[test]
    fn order_id_single() {
        let key = decode(&meta(&[("order_id", "7|42")])).unwrap();
        assert_eq!(
            key,
            RoutingKey::Order {
                invoice_ids: vec![RecordId::new(7)],
                user_id: UserId::new(42),
            }
        );
    }

    #[test]
    fn order_id_comma_list() {
        let key = decode(&meta(&[("order_id", "7,8,9|42")])).unwrap();
        assert_eq!(
            key,
            RoutingKey::Order {
                invoice_ids: vec![RecordId::new(7), RecordId::new(8), RecordId::new(9)],
                user_id: UserId::new(42),
            }
        );
    }

    #[test]
    fn order_id_malformed_variants() {
        for bad in ["7,8,9", "|42", "7|", "7|42|1", "a,b|42", "7|x"] {
            let err = decode(&meta(&[("order_id", bad)])).unwrap_err();
            assert_eq!(err, RoutingError::MalformedOrderId(bad.into()), "{bad}");
        }
    }

    #[test]
    fn no_hints_resolves_to_reference() {
        assert_eq!(decode(&meta(&[])).unwrap(), RoutingKey::Reference);
        assert_eq!(
            decode(&meta(&[("order_type", ""), ("month", "")])).unwrap(),
            RoutingKey::Reference
        );
    }
}
