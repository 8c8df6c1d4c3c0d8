#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use admin_revoker::audit::RecordingAuditReporter;
use admin_revoker::authority::{
    Identifier, Registration, RegistrationAuthority, RevokedAuthorizations, StorageAuthority,
};
use admin_revoker::certificate::ParsedCertificate;
use admin_revoker::storage::{CertificateRecord, InMemoryCertificateStore};
use admin_revoker::{AuthorityError, RevocationOrchestrator, RevocationReason};
use async_trait::async_trait;
use mockall::mock;

mock! {
    pub Ra {}

    #[async_trait]
    impl RegistrationAuthority for Ra {
        async fn administratively_revoke_certificate(
            &self,
            certificate: &ParsedCertificate,
            reason: RevocationReason,
            admin_name: &str,
        ) -> Result<(), AuthorityError>;
    }
}

mock! {
    pub Sa {}

    #[async_trait]
    impl StorageAuthority for Sa {
        async fn get_registration(&self, id: i64) -> Result<Option<Registration>, AuthorityError>;

        async fn revoke_authorizations_by_domain(
            &self,
            identifier: &Identifier,
        ) -> Result<RevokedAuthorizations, AuthorityError>;
    }
}

/// Mint a self-signed certificate and store it under its own serial
pub fn issue(registration_id: i64) -> CertificateRecord {
    let cert = rcgen::generate_simple_self_signed(vec![format!("reg{}.example", registration_id)])
        .expect("generate certificate");
    let der = cert.serialize_der().expect("serialize certificate");
    let serial = ParsedCertificate::from_der("minted", &der)
        .expect("decode minted certificate")
        .serial;

    CertificateRecord {
        serial,
        der,
        registration_id,
    }
}

pub fn registration(id: i64) -> Registration {
    Registration {
        id,
        contact: vec!["mailto:admin@example.com".to_string()],
        status: "valid".to_string(),
    }
}

pub async fn store_with(records: &[CertificateRecord]) -> InMemoryCertificateStore {
    let store = InMemoryCertificateStore::new();
    for record in records {
        store.insert(record.clone()).await;
    }
    store
}

/// A registration authority that accepts every serial except `reject`,
/// remembering the order of calls
pub fn recording_ra(calls: Arc<Mutex<Vec<String>>>, reject: Option<String>) -> MockRa {
    let mut ra = MockRa::new();
    ra.expect_administratively_revoke_certificate()
        .returning(move |certificate, _, _| {
            calls.lock().unwrap().push(certificate.serial.clone());
            if reject.as_deref() == Some(certificate.serial.as_str()) {
                Err(AuthorityError::Status {
                    code: "Internal".to_string(),
                    message: "RA unavailable".to_string(),
                })
            } else {
                Ok(())
            }
        });
    ra
}

pub struct Harness {
    pub orchestrator: RevocationOrchestrator,
    pub audit: Arc<RecordingAuditReporter>,
}

pub fn harness(ra: MockRa, sa: MockSa) -> Harness {
    let audit = Arc::new(RecordingAuditReporter::new());
    let orchestrator = RevocationOrchestrator::new(Arc::new(ra), Arc::new(sa), audit.clone());
    Harness { orchestrator, audit }
}
