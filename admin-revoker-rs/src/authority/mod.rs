// admin-revoker-rs/src/authority/mod.rs
//
// Clients for the remote registration and storage authorities.
// The transport (gRPC or legacy HTTP) is picked once here, at construction;
// callers only ever see the two traits below.

pub mod grpc;
pub mod http;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::certificate::ParsedCertificate;
use crate::config::{RevokerConfig, TlsConfig, Transport};
use crate::error::AuthorityError;
use crate::reasons::RevocationReason;

/// Identifier kinds the storage authority understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    Dns,
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierType::Dns => write!(f, "dns"),
        }
    }
}

/// An authorization identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: IdentifierType,
    pub value: String,
}

impl Identifier {
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierType::Dns,
            value: value.into(),
        }
    }
}

/// Account registration as held by the storage authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: i64,
    #[serde(default)]
    pub contact: Vec<String>,
    #[serde(default)]
    pub status: String,
}

/// Authorizations invalidated by a domain revocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedAuthorizations {
    /// Previously valid (final) authorizations
    pub valid: i64,
    /// Previously pending authorizations
    pub pending: i64,
}

/// Registration authority: performs the actual revocation
#[async_trait]
pub trait RegistrationAuthority: Send + Sync {
    /// Revoke a certificate on behalf of an administrator. Irreversible once
    /// it returns `Ok`.
    async fn administratively_revoke_certificate(
        &self,
        certificate: &ParsedCertificate,
        reason: RevocationReason,
        admin_name: &str,
    ) -> Result<(), AuthorityError>;
}

/// Storage authority: registrations and authorizations
#[async_trait]
pub trait StorageAuthority: Send + Sync {
    /// Look up a registration; `None` when it does not exist
    async fn get_registration(&self, id: i64) -> Result<Option<Registration>, AuthorityError>;

    /// Invalidate every pending and valid authorization for an identifier
    async fn revoke_authorizations_by_domain(
        &self,
        identifier: &Identifier,
    ) -> Result<RevokedAuthorizations, AuthorityError>;
}

/// The pair of authority clients used by one process
#[derive(Clone)]
pub struct AuthorityClients {
    pub registration_authority: Arc<dyn RegistrationAuthority>,
    pub storage_authority: Arc<dyn StorageAuthority>,
}

/// PEM material for mutual TLS with the authorities
#[derive(Debug, Clone, Default)]
pub struct TlsMaterial {
    pub ca_cert_pem: Option<Vec<u8>>,
    pub cert_pem: Option<Vec<u8>>,
    pub key_pem: Option<Vec<u8>>,
    pub server_name: Option<String>,
}

impl TlsMaterial {
    /// Read every configured PEM file
    pub async fn load(config: &TlsConfig) -> Result<Self, AuthorityError> {
        Ok(Self {
            ca_cert_pem: read_pem(config.ca_cert_file.as_deref()).await?,
            cert_pem: read_pem(config.cert_file.as_deref()).await?,
            key_pem: read_pem(config.key_file.as_deref()).await?,
            server_name: config.server_name.clone(),
        })
    }

    /// Client certificate and key, when both are present
    pub fn identity(&self) -> Option<(&[u8], &[u8])> {
        match (&self.cert_pem, &self.key_pem) {
            (Some(cert), Some(key)) => Some((cert.as_slice(), key.as_slice())),
            _ => None,
        }
    }
}

async fn read_pem(path: Option<&Path>) -> Result<Option<Vec<u8>>, AuthorityError> {
    match path {
        Some(path) => tokio::fs::read(path).await.map(Some).map_err(|e| {
            AuthorityError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        }),
        None => Ok(None),
    }
}

/// Build both authority clients over the configured transport
pub async fn connect(config: &RevokerConfig) -> Result<AuthorityClients, AuthorityError> {
    let tls = match &config.tls {
        Some(tls_config) => Some(TlsMaterial::load(tls_config).await?),
        None => None,
    };

    let clients = match config.transport {
        Transport::Grpc => {
            let ra_channel = grpc::channel(&config.ra_service, tls.as_ref())?;
            let sa_channel = grpc::channel(&config.sa_service, tls.as_ref())?;
            AuthorityClients {
                registration_authority: Arc::new(grpc::GrpcRegistrationAuthority::new(ra_channel)),
                storage_authority: Arc::new(grpc::GrpcStorageAuthority::new(sa_channel)),
            }
        }
        Transport::Http => AuthorityClients {
            registration_authority: Arc::new(http::HttpRegistrationAuthority::new(
                &config.ra_service,
                tls.as_ref(),
            )?),
            storage_authority: Arc::new(http::HttpStorageAuthority::new(
                &config.sa_service,
                tls.as_ref(),
            )?),
        },
    };

    info!(
        transport = %config.transport,
        ra = %config.ra_service.address,
        sa = %config.sa_service.address,
        "Authority clients ready"
    );
    Ok(clients)
}
