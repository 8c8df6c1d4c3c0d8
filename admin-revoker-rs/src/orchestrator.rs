// admin-revoker-rs/src/orchestrator.rs
//
// Revocation workflows: by serial, by registration (cascade) and by domain.
// The orchestrator never opens or resolves a transaction itself; callers pass
// one in and decide between commit and rollback.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audit::AuditReporter;
use crate::authority::{Identifier, RegistrationAuthority, RevokedAuthorizations, StorageAuthority};
use crate::certificate::ParsedCertificate;
use crate::error::{Result, RevokerError};
use crate::reasons::{self, RevocationReason};
use crate::storage::StoreTransaction;

/// A certificate the registration authority accepted for revocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedCertificate {
    pub serial: String,
    pub reason: RevocationReason,
}

/// Drives revocations against the authorities
#[derive(Clone)]
pub struct RevocationOrchestrator {
    registration_authority: Arc<dyn RegistrationAuthority>,
    storage_authority: Arc<dyn StorageAuthority>,
    audit: Arc<dyn AuditReporter>,
}

impl RevocationOrchestrator {
    pub fn new(
        registration_authority: Arc<dyn RegistrationAuthority>,
        storage_authority: Arc<dyn StorageAuthority>,
        audit: Arc<dyn AuditReporter>,
    ) -> Self {
        Self {
            registration_authority,
            storage_authority,
            audit,
        }
    }

    /// Revoke one certificate by serial.
    ///
    /// The reason is validated before anything else. Remote errors propagate
    /// unchanged; `tx` stays open for the caller to resolve.
    pub async fn revoke_by_serial(
        &self,
        tx: &mut dyn StoreTransaction,
        serial: &str,
        reason_code: i64,
        admin: &str,
    ) -> Result<RevokedCertificate> {
        let reason = reasons::validate(reason_code)?;
        self.revoke_serial(tx, serial, reason, admin).await
    }

    async fn revoke_serial(
        &self,
        tx: &mut dyn StoreTransaction,
        serial: &str,
        reason: RevocationReason,
        admin: &str,
    ) -> Result<RevokedCertificate> {
        let record = tx
            .select_certificate_by_serial(serial)
            .await?
            .ok_or_else(|| RevokerError::NotFound(format!("certificate with serial {:?} not found", serial)))?;

        let certificate = ParsedCertificate::from_der(&record.serial, &record.der)?;
        debug!(serial, subject = %certificate.subject, "Decoded certificate");

        self.registration_authority
            .administratively_revoke_certificate(&certificate, reason, admin)
            .await?;

        self.audit.certificate_revoked(serial, reason, admin);

        Ok(RevokedCertificate {
            serial: serial.to_string(),
            reason,
        })
    }

    /// Revoke every certificate owned by a registration, in store order,
    /// stopping at the first failure.
    pub async fn revoke_by_registration(
        &self,
        tx: &mut dyn StoreTransaction,
        registration_id: i64,
        reason_code: i64,
        admin: &str,
    ) -> Result<Vec<RevokedCertificate>> {
        let reason = reasons::validate(reason_code)?;

        if self
            .storage_authority
            .get_registration(registration_id)
            .await?
            .is_none()
        {
            return Err(RevokerError::NotFound(format!(
                "registration {} not found",
                registration_id
            )));
        }

        let records = tx.select_certificates_by_registration(registration_id).await?;
        info!(registration_id, count = records.len(), "Revoking certificates for registration");

        let mut revoked = Vec::with_capacity(records.len());
        for record in records {
            match self.revoke_serial(&mut *tx, &record.serial, reason, admin).await {
                Ok(certificate) => revoked.push(certificate),
                Err(err) => {
                    // Revocations already accepted by the authority are not
                    // undone by the caller's rollback; report them.
                    let revoked: Vec<String> = revoked.into_iter().map(|c| c.serial).collect();
                    if !revoked.is_empty() {
                        warn!(
                            registration_id,
                            failed_serial = %record.serial,
                            already_revoked = ?revoked,
                            "Cascade aborted after partial remote revocation"
                        );
                    }
                    return Err(RevokerError::CascadeAborted {
                        registration_id,
                        revoked,
                        failed_serial: record.serial,
                        source: Box::new(err),
                    });
                }
            }
        }

        Ok(revoked)
    }

    /// Invalidate all pending and valid authorizations for an identifier
    pub async fn revoke_authorizations_by_domain(
        &self,
        identifier: &Identifier,
    ) -> Result<RevokedAuthorizations> {
        let revoked = self
            .storage_authority
            .revoke_authorizations_by_domain(identifier)
            .await?;

        self.audit.authorizations_revoked(identifier, &revoked);
        Ok(revoked)
    }

    /// The accepted reason codes
    pub fn list_reasons(&self) -> Vec<(u8, &'static str)> {
        reasons::all()
    }
}
