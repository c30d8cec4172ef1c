//! Payment and customer status enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a payment attempt.
///
/// Most payment tables store the integer code; the commission table stores
/// the string form. Both mappings live here so no table invents its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Payment is pending or still being processed.
    Processing,
    /// Payment completed successfully.
    Succeeded,
    /// Payment failed.
    Failed,
}

impl PaymentStatus {
    /// The integer status code stored by the integer-coded tables.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Processing => 1,
            Self::Succeeded => 2,
            Self::Failed => 3,
        }
    }

    /// The string status stored by the commission table.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Decode an integer status code.
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Processing),
            2 => Some(Self::Succeeded),
            3 => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification status of a customer's collected payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerStatus {
    /// Bank-account collection started but not finished.
    Pending,
    /// The processor confirmed the payment method.
    Verified,
    /// Collection or verification failed.
    Failed,
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_store_contract() {
        assert_eq!(PaymentStatus::Processing.code(), 1);
        assert_eq!(PaymentStatus::Succeeded.code(), 2);
        assert_eq!(PaymentStatus::Failed.code(), 3);
    }

    #[test]
    fn code_roundtrip() {
        for status in [
            PaymentStatus::Processing,
            PaymentStatus::Succeeded,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(PaymentStatus::from_code(0), None);
        assert_eq!(PaymentStatus::from_code(4), None);
    }

    #[test]
    fn string_form_matches_commission_contract() {
        assert_eq!(PaymentStatus::Processing.as_str(), "processing");
        assert_eq!(PaymentStatus::Succeeded.as_str(), "succeeded");
        assert_eq!(PaymentStatus::Failed.as_str(), "failed");
    }
}
