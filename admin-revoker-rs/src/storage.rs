// admin-revoker-rs/src/storage.rs
//
// Certificate store abstraction for the revoker
// Provides:
// - Transaction-scoped reads of certificate records
// - PostgreSQL backend (sqlx)
// - In-memory backend for development and tests
// - A time bound on every transaction operation
//
// The revoker never writes certificate records. A transaction exists so that
// every read of one command sees a single snapshot and is resolved exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::DbConfig;
use crate::error::{ConfigError, StoreError};

/// A stored certificate as issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CertificateRecord {
    pub serial: String,
    pub der: Vec<u8>,
    pub registration_id: i64,
}

/// An open transaction on the certificate store
#[async_trait]
pub trait StoreTransaction: Send {
    /// Select one certificate by serial
    async fn select_certificate_by_serial(
        &mut self,
        serial: &str,
    ) -> Result<Option<CertificateRecord>, StoreError>;

    /// Select every certificate owned by a registration, in store order
    async fn select_certificates_by_registration(
        &mut self,
        registration_id: i64,
    ) -> Result<Vec<CertificateRecord>, StoreError>;

    /// Commit and close the transaction
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Roll back and close the transaction
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Certificate store backend
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Open a new transaction
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Check if the store is reachable
    async fn is_healthy(&self) -> bool;
}

/// PostgreSQL certificate store
pub struct PostgresCertificateStore {
    pool: PgPool,
}

impl PostgresCertificateStore {
    /// Connect a pool to the certificate database
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await?;

        info!(max_connections, "Connected to certificate database");
        Ok(Self { pool })
    }

    /// Build a pool that connects on first use. Commands that never touch
    /// the certificate database do not pay for a connection.
    pub fn connect_lazy(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect_lazy(database_url)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl CertificateStore for PostgresCertificateStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        debug!("Opened certificate store transaction");
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn select_certificate_by_serial(
        &mut self,
        serial: &str,
    ) -> Result<Option<CertificateRecord>, StoreError> {
        let record = sqlx::query_as::<_, CertificateRecord>(
            "SELECT serial, der, registration_id FROM certificates WHERE serial = $1",
        )
        .bind(serial)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn select_certificates_by_registration(
        &mut self,
        registration_id: i64,
    ) -> Result<Vec<CertificateRecord>, StoreError> {
        // No ORDER BY: cascades walk certificates in whatever order the
        // database returns them.
        let records = sqlx::query_as::<_, CertificateRecord>(
            "SELECT serial, der, registration_id FROM certificates WHERE registration_id = $1",
        )
        .bind(registration_id)
        .fetch_all(&mut *self.tx)
        .await?;

        debug!(registration_id, count = records.len(), "Selected certificates for registration");
        Ok(records)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Default bound on a single store operation
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

async fn bounded<T, F>(operation: &'static str, limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, limit_ms = limit.as_millis() as u64, "Certificate store operation timed out");
            Err(StoreError::Timeout {
                operation,
                after: limit,
            })
        }
    }
}

/// Open a transaction whose begin, queries, commit and rollback are each
/// bounded by `limit`
pub async fn begin_bounded(
    store: &dyn CertificateStore,
    limit: Duration,
) -> Result<Box<dyn StoreTransaction>, StoreError> {
    let inner = bounded("begin", limit, store.begin()).await?;
    Ok(Box::new(TimedTransaction { inner, limit }))
}

struct TimedTransaction {
    inner: Box<dyn StoreTransaction>,
    limit: Duration,
}

#[async_trait]
impl StoreTransaction for TimedTransaction {
    async fn select_certificate_by_serial(
        &mut self,
        serial: &str,
    ) -> Result<Option<CertificateRecord>, StoreError> {
        bounded("select", self.limit, self.inner.select_certificate_by_serial(serial)).await
    }

    async fn select_certificates_by_registration(
        &mut self,
        registration_id: i64,
    ) -> Result<Vec<CertificateRecord>, StoreError> {
        bounded(
            "select",
            self.limit,
            self.inner.select_certificates_by_registration(registration_id),
        )
        .await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let TimedTransaction { inner, limit } = *self;
        bounded("commit", limit, inner.commit()).await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let TimedTransaction { inner, limit } = *self;
        bounded("rollback", limit, inner.rollback()).await
    }
}

/// Everything the in-memory store observed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Begin,
    SelectBySerial(String),
    SelectByRegistration(i64),
    Commit,
    Rollback,
}

/// In-memory certificate store for development and tests
#[derive(Clone, Default)]
pub struct InMemoryCertificateStore {
    records: Arc<RwLock<Vec<CertificateRecord>>>,
    journal: Arc<Mutex<Vec<StoreEvent>>>,
    fail_commit: bool,
}

impl InMemoryCertificateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose commits always fail
    pub fn with_failing_commit() -> Self {
        Self {
            fail_commit: true,
            ..Self::default()
        }
    }

    /// Add a record; records are returned in insertion order
    pub async fn insert(&self, record: CertificateRecord) {
        self.records.write().await.push(record);
    }

    /// Snapshot of the journal
    pub async fn events(&self) -> Vec<StoreEvent> {
        self.journal.lock().await.clone()
    }

    /// Number of transactions opened so far
    pub async fn transactions_opened(&self) -> usize {
        self.journal
            .lock()
            .await
            .iter()
            .filter(|event| **event == StoreEvent::Begin)
            .count()
    }
}

#[async_trait]
impl CertificateStore for InMemoryCertificateStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        self.journal.lock().await.push(StoreEvent::Begin);
        Ok(Box::new(InMemoryTransaction {
            records: self.records.clone(),
            journal: self.journal.clone(),
            fail_commit: self.fail_commit,
        }))
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

struct InMemoryTransaction {
    records: Arc<RwLock<Vec<CertificateRecord>>>,
    journal: Arc<Mutex<Vec<StoreEvent>>>,
    fail_commit: bool,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn select_certificate_by_serial(
        &mut self,
        serial: &str,
    ) -> Result<Option<CertificateRecord>, StoreError> {
        self.journal
            .lock()
            .await
            .push(StoreEvent::SelectBySerial(serial.to_string()));

        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.serial == serial).cloned())
    }

    async fn select_certificates_by_registration(
        &mut self,
        registration_id: i64,
    ) -> Result<Vec<CertificateRecord>, StoreError> {
        self.journal
            .lock()
            .await
            .push(StoreEvent::SelectByRegistration(registration_id));

        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.registration_id == registration_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.fail_commit {
            return Err(StoreError::Backend("commit rejected".to_string()));
        }
        self.journal.lock().await.push(StoreEvent::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.journal.lock().await.push(StoreEvent::Rollback);
        Ok(())
    }
}

/// Create the certificate store described by the configuration
pub async fn create_certificate_store(
    config: &DbConfig,
) -> Result<Arc<dyn CertificateStore>, ConfigError> {
    let url = config.database_url()?;
    if url.starts_with("memory:") {
        info!("Using in-memory certificate store");
        return Ok(Arc::new(InMemoryCertificateStore::new()));
    }

    let store = if config.lazy_connect {
        PostgresCertificateStore::connect_lazy(&url, config.max_connections, config.connect_timeout())
    } else {
        PostgresCertificateStore::connect(&url, config.max_connections, config.connect_timeout()).await
    }
    .map_err(|e| ConfigError::AccessError(format!("Couldn't setup database connection: {}", e)))?;

    Ok(Arc::new(store))
}
