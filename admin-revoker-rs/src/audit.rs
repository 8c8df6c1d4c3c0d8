// admin-revoker-rs/src/audit.rs
//
// Audit trail for administrative revocations.
// Every successful remote revocation produces exactly one audit record.
// Records go to the `audit` tracing target; counters go through the
// `metrics` facade.

use std::fmt;
use std::sync::Mutex;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::authority::{Identifier, RevokedAuthorizations};
use crate::reasons::RevocationReason;

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    CertificateRevoked,
    AuthorizationsRevoked,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::CertificateRevoked => write!(f, "certificate_revoked"),
            EventType::AuthorizationsRevoked => write!(f, "authorizations_revoked"),
        }
    }
}

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditRecord {
    pub event_type: EventType,
    pub admin: Option<String>,
    pub message: String,
}

/// Line recorded for a revoked certificate
pub fn certificate_revoked_message(serial: &str, reason: RevocationReason) -> String {
    format!("Revoked certificate {} with reason '{}'", serial, reason.label())
}

/// Line recorded for a domain authorization revocation
pub fn authorizations_revoked_message(identifier: &Identifier, revoked: &RevokedAuthorizations) -> String {
    format!(
        "Revoked {} pending authorizations and {} final authorizations for {}",
        revoked.pending, revoked.valid, identifier.value
    )
}

/// Sink for audit records
pub trait AuditReporter: Send + Sync {
    fn certificate_revoked(&self, serial: &str, reason: RevocationReason, admin: &str);

    fn authorizations_revoked(&self, identifier: &Identifier, revoked: &RevokedAuthorizations);
}

/// Emits audit records as tracing events and bumps revocation counters
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditReporter;

impl TracingAuditReporter {
    pub fn new() -> Self {
        Self
    }
}

impl AuditReporter for TracingAuditReporter {
    fn certificate_revoked(&self, serial: &str, reason: RevocationReason, admin: &str) {
        info!(
            target: "audit",
            event_type = %EventType::CertificateRevoked,
            serial,
            reason_code = reason.code(),
            admin,
            "{}",
            certificate_revoked_message(serial, reason)
        );
        counter!("admin_revoker.revoked_certificates", 1, "reason" => reason.label());
    }

    fn authorizations_revoked(&self, identifier: &Identifier, revoked: &RevokedAuthorizations) {
        info!(
            target: "audit",
            event_type = %EventType::AuthorizationsRevoked,
            identifier = %identifier.value,
            pending = revoked.pending,
            valid = revoked.valid,
            "{}",
            authorizations_revoked_message(identifier, revoked)
        );
        counter!("admin_revoker.revoked_authorizations", non_negative(revoked.valid));
        counter!("admin_revoker.revoked_pending_authorizations", non_negative(revoked.pending));
    }
}

fn non_negative(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// Keeps audit records in memory; used by tests and embedding callers
#[derive(Debug, Default)]
pub struct RecordingAuditReporter {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record so far
    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages only, in emission order
    pub fn messages(&self) -> Vec<String> {
        self.records().into_iter().map(|record| record.message).collect()
    }

    fn push(&self, record: AuditRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

impl AuditReporter for RecordingAuditReporter {
    fn certificate_revoked(&self, serial: &str, reason: RevocationReason, admin: &str) {
        self.push(AuditRecord {
            event_type: EventType::CertificateRevoked,
            admin: Some(admin.to_string()),
            message: certificate_revoked_message(serial, reason),
        });
    }

    fn authorizations_revoked(&self, identifier: &Identifier, revoked: &RevokedAuthorizations) {
        self.push(AuditRecord {
            event_type: EventType::AuthorizationsRevoked,
            admin: None,
            message: authorizations_revoked_message(identifier, revoked),
        });
    }
}
