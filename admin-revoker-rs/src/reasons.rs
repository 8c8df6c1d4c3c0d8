// admin-revoker-rs/src/reasons.rs
//
// Revocation reason taxonomy (RFC 5280 CRLReason).
// Code 7 is unassigned in the standard and is never accepted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RevokerError;

/// A validated revocation reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RevocationReason {
    Unspecified = 0,
    KeyCompromise = 1,
    CaCompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    RemoveFromCrl = 8,
    PrivilegeWithdrawn = 9,
    AaCompromise = 10,
}

/// Every accepted reason, ascending by code
const ALL_REASONS: [RevocationReason; 10] = [
    RevocationReason::Unspecified,
    RevocationReason::KeyCompromise,
    RevocationReason::CaCompromise,
    RevocationReason::AffiliationChanged,
    RevocationReason::Superseded,
    RevocationReason::CessationOfOperation,
    RevocationReason::CertificateHold,
    RevocationReason::RemoveFromCrl,
    RevocationReason::PrivilegeWithdrawn,
    RevocationReason::AaCompromise,
];

impl RevocationReason {
    /// Numeric reason code as sent to the authority
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Canonical label
    pub fn label(self) -> &'static str {
        match self {
            RevocationReason::Unspecified => "unspecified",
            RevocationReason::KeyCompromise => "keyCompromise",
            RevocationReason::CaCompromise => "cACompromise",
            RevocationReason::AffiliationChanged => "affiliationChanged",
            RevocationReason::Superseded => "superseded",
            RevocationReason::CessationOfOperation => "cessationOfOperation",
            RevocationReason::CertificateHold => "certificateHold",
            RevocationReason::RemoveFromCrl => "removeFromCRL",
            RevocationReason::PrivilegeWithdrawn => "privilegeWithdrawn",
            RevocationReason::AaCompromise => "aACompromise",
        }
    }
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Check a raw reason code. Callers must run this before any lookup or
/// remote call for the operation the code belongs to.
pub fn validate(code: i64) -> Result<RevocationReason, RevokerError> {
    ALL_REASONS
        .iter()
        .copied()
        .find(|reason| i64::from(reason.code()) == code)
        .ok_or(RevokerError::InvalidReason(code))
}

/// Label for a raw reason code
pub fn describe(code: i64) -> Result<&'static str, RevokerError> {
    validate(code).map(RevocationReason::label)
}

/// `(code, label)` pairs for every accepted reason, ascending by code
pub fn all() -> Vec<(u8, &'static str)> {
    ALL_REASONS
        .iter()
        .map(|reason| (reason.code(), reason.label()))
        .collect()
}
