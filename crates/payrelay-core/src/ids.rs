//! Identifier types for payrelay.
//!
//! Record identifiers are assigned by the surrounding application and arrive
//! here either as integers (stored rows) or as decimal strings (processor
//! event metadata), so every id is a thin newtype over `i64`.
//!
//! # Macro-based ID types
//!
//! The `int_id_type!` macro reduces boilerplate for integer-backed
//! identifier types, ensuring consistent implementation of serialization,
//! parsing, and display traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The value was not a valid decimal integer.
    #[error("invalid integer id: {0:?}")]
    InvalidInteger(String),
}

/// Macro to define an integer-backed identifier type with standard trait
/// implementations.
///
/// Generates a newtype wrapper around `i64` with implementations for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (transparent, as a plain integer)
/// - `FromStr` (decimal string, as found in event metadata), `Display`, `Debug`
macro_rules! int_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create an identifier from a raw integer.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Return the underlying integer.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }

            /// Big-endian byte encoding, used for store keys so that
            /// iteration order matches id order.
            #[must_use]
            pub const fn to_be_bytes(&self) -> [u8; 8] {
                self.0.to_be_bytes()
            }

            /// Decode from the big-endian store-key encoding.
            #[must_use]
            pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
                Self(i64::from_be_bytes(bytes))
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| IdError::InvalidInteger(s.to_string()))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

int_id_type!(
    UserId,
    "A customer/user identifier, assigned by the surrounding application."
);
int_id_type!(
    RecordId,
    "A payment-record row identifier (invoice, rule payment, request payment, ...)."
);
int_id_type!(AdminId, "An admin identifier, used in the commission composite key.");
int_id_type!(CartId, "A cart identifier, used to match additional-charge records.");
