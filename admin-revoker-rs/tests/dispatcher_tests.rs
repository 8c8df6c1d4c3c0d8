mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use admin_revoker::authority::RevokedAuthorizations;
use admin_revoker::storage::{
    CertificateRecord, CertificateStore, InMemoryCertificateStore, StoreEvent, StoreTransaction,
};
use admin_revoker::{AuthorityError, Command, CommandOutcome, Dispatcher, RevokerError, StoreError};
use async_trait::async_trait;

use common::{harness, issue, recording_ra, registration, store_with, MockRa, MockSa};

fn dispatcher(ra: MockRa, sa: MockSa, store: &InMemoryCertificateStore) -> Dispatcher {
    let h = harness(ra, sa);
    Dispatcher::new(h.orchestrator, Arc::new(store.clone()), "alice")
}

#[tokio::test]
async fn test_serial_revoke_commits() {
    let record = issue(1);
    let store = store_with(&[record.clone()]).await;
    let calls = Arc::new(Mutex::new(Vec::new()));

    let outcome = dispatcher(recording_ra(calls.clone(), None), MockSa::new(), &store)
        .run(Command::SerialRevoke {
            serial: record.serial.clone(),
            reason_code: 1,
        })
        .await
        .unwrap();

    assert!(matches!(outcome, CommandOutcome::CertificateRevoked(ref c) if c.serial == record.serial));
    assert_eq!(
        store.events().await,
        vec![
            StoreEvent::Begin,
            StoreEvent::SelectBySerial(record.serial.clone()),
            StoreEvent::Commit,
        ]
    );
}

#[tokio::test]
async fn test_serial_revoke_invalid_reason_rolls_back() {
    let store = store_with(&[issue(1)]).await;
    let mut ra = MockRa::new();
    ra.expect_administratively_revoke_certificate().never();

    let err = dispatcher(ra, MockSa::new(), &store)
        .run(Command::SerialRevoke {
            serial: "01".to_string(),
            reason_code: 7,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RevokerError::InvalidReason(7)));
    assert_eq!(store.events().await, vec![StoreEvent::Begin, StoreEvent::Rollback]);
}

#[tokio::test]
async fn test_reg_revoke_commits_when_all_succeed() {
    let records = vec![issue(5), issue(5), issue(5)];
    let store = store_with(&records).await;
    let calls = Arc::new(Mutex::new(Vec::new()));

    let mut sa = MockSa::new();
    sa.expect_get_registration()
        .returning(|id| Ok(Some(registration(id))));

    let outcome = dispatcher(recording_ra(calls.clone(), None), sa, &store)
        .run(Command::RegRevoke {
            registration_id: 5,
            reason_code: 4,
        })
        .await
        .unwrap();

    match outcome {
        CommandOutcome::RegistrationRevoked {
            registration_id,
            certificates,
        } => {
            assert_eq!(registration_id, 5);
            assert_eq!(certificates.len(), 3);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(calls.lock().unwrap().len(), 3);

    let events = store.events().await;
    assert_eq!(events.first(), Some(&StoreEvent::Begin));
    assert_eq!(events.last(), Some(&StoreEvent::Commit));
    assert!(!events.contains(&StoreEvent::Rollback));
}

#[tokio::test]
async fn test_reg_revoke_rolls_back_on_second_failure() {
    let records = vec![issue(5), issue(5), issue(5)];
    let store = store_with(&records).await;
    let calls = Arc::new(Mutex::new(Vec::new()));

    let mut sa = MockSa::new();
    sa.expect_get_registration()
        .returning(|id| Ok(Some(registration(id))));

    let err = dispatcher(
        recording_ra(calls.clone(), Some(records[1].serial.clone())),
        sa,
        &store,
    )
    .run(Command::RegRevoke {
        registration_id: 5,
        reason_code: 4,
    })
    .await
    .unwrap_err();

    // First certificate stays revoked remotely; third is never attempted
    assert_eq!(calls.lock().unwrap().len(), 2);
    assert!(matches!(err, RevokerError::CascadeAborted { ref revoked, .. } if revoked == &vec![records[0].serial.clone()]));

    let events = store.events().await;
    assert_eq!(events.last(), Some(&StoreEvent::Rollback));
    assert!(!events.contains(&StoreEvent::Commit));
    assert_eq!(store.transactions_opened().await, 1);
}

#[tokio::test]
async fn test_commit_failure_is_reported() {
    let record = issue(1);
    let store = InMemoryCertificateStore::with_failing_commit();
    store.insert(record.clone()).await;
    let calls = Arc::new(Mutex::new(Vec::new()));

    let err = dispatcher(recording_ra(calls, None), MockSa::new(), &store)
        .run(Command::SerialRevoke {
            serial: record.serial,
            reason_code: 0,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RevokerError::StoreFailure(_)));
}

#[tokio::test]
async fn test_auth_revoke_opens_no_transaction() {
    let store = store_with(&[]).await;
    let mut sa = MockSa::new();
    sa.expect_revoke_authorizations_by_domain()
        .times(1)
        .returning(|_| Ok(RevokedAuthorizations { valid: 2, pending: 1 }));

    let outcome = dispatcher(MockRa::new(), sa, &store)
        .run(Command::AuthRevoke {
            domain: "example.invalid".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CommandOutcome::AuthorizationsRevoked {
            domain: "example.invalid".to_string(),
            revoked: RevokedAuthorizations { valid: 2, pending: 1 },
        }
    );
    assert_eq!(store.transactions_opened().await, 0);
}

#[tokio::test]
async fn test_list_reasons_needs_nothing() {
    let store = store_with(&[]).await;

    let outcome = dispatcher(MockRa::new(), MockSa::new(), &store)
        .run(Command::ListReasons)
        .await
        .unwrap();

    let rendered = outcome.to_string();
    assert!(rendered.starts_with("Revocation reason codes\n-----------------------\n\n0: unspecified\n"));
    assert_eq!(rendered.lines().filter(|l| l.contains(": ")).count(), 10);
    assert!(store.events().await.is_empty());
}

#[tokio::test]
async fn test_reg_revoke_registration_lookup_failure_rolls_back() {
    let store = store_with(&[issue(5), issue(5)]).await;

    let mut ra = MockRa::new();
    ra.expect_administratively_revoke_certificate().never();
    let mut sa = MockSa::new();
    sa.expect_get_registration().times(1).returning(|_| {
        Err(AuthorityError::Status {
            code: "Unavailable".to_string(),
            message: "SA unreachable".to_string(),
        })
    });

    let err = dispatcher(ra, sa, &store)
        .run(Command::RegRevoke {
            registration_id: 5,
            reason_code: 1,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, RevokerError::RemoteCallFailure(AuthorityError::Status { ref code, .. }) if code == "Unavailable"));
    assert_eq!(store.events().await, vec![StoreEvent::Begin, StoreEvent::Rollback]);
}

/// A store whose queries never complete
struct StalledStore;

struct StalledTransaction;

#[async_trait]
impl CertificateStore for StalledStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(StalledTransaction))
    }

    async fn is_healthy(&self) -> bool {
        false
    }
}

#[async_trait]
impl StoreTransaction for StalledTransaction {
    async fn select_certificate_by_serial(
        &mut self,
        _serial: &str,
    ) -> Result<Option<CertificateRecord>, StoreError> {
        std::future::pending().await
    }

    async fn select_certificates_by_registration(
        &mut self,
        _registration_id: i64,
    ) -> Result<Vec<CertificateRecord>, StoreError> {
        std::future::pending().await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_stalled_store_query_is_bounded() {
    let mut ra = MockRa::new();
    ra.expect_administratively_revoke_certificate().never();
    let h = harness(ra, MockSa::new());
    let dispatcher = Dispatcher::new(h.orchestrator, Arc::new(StalledStore), "alice")
        .with_store_timeout(Duration::from_millis(100));

    let result = tokio::time::timeout(
        Duration::from_secs(3),
        dispatcher.run(Command::SerialRevoke {
            serial: "0a".to_string(),
            reason_code: 1,
        }),
    )
    .await
    .expect("store query was not bounded");

    match result {
        Err(RevokerError::StoreFailure(StoreError::Timeout { operation, .. })) => assert_eq!(operation, "select"),
        other => panic!("expected a store timeout, got {:?}", other),
    }
}
