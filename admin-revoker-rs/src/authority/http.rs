// admin-revoker-rs/src/authority/http.rs
//
// Legacy JSON-over-HTTP clients for the registration and storage authorities.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    Identifier, Registration, RegistrationAuthority, RevokedAuthorizations, StorageAuthority,
    TlsMaterial,
};
use crate::certificate::ParsedCertificate;
use crate::config::ServiceConfig;
use crate::error::AuthorityError;
use crate::reasons::RevocationReason;

const USER_AGENT: &str = concat!("admin-revoker/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with the service deadline and optional client TLS
pub fn build_http_client(
    service: &ServiceConfig,
    tls: Option<&TlsMaterial>,
) -> Result<Client, AuthorityError> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .user_agent(USER_AGENT)
        .timeout(service.timeout())
        .connect_timeout(service.timeout());

    if let Some(tls) = tls {
        if let Some(ca) = &tls.ca_cert_pem {
            let ca = reqwest::Certificate::from_pem(ca)
                .map_err(|e| AuthorityError::Configuration(format!("Invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(ca);
        }
        if let Some((cert, key)) = tls.identity() {
            let mut pem = cert.to_vec();
            pem.push(b'\n');
            pem.extend_from_slice(key);
            let identity = reqwest::Identity::from_pem(&pem)
                .map_err(|e| AuthorityError::Configuration(format!("Invalid client identity: {}", e)))?;
            builder = builder.identity(identity);
        }
    }

    builder
        .build()
        .map_err(|e| AuthorityError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Turn a non-success response into an authority status error
async fn status_error(response: Response) -> AuthorityError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    AuthorityError::Status {
        code: status.as_u16().to_string(),
        message: if message.is_empty() {
            status.canonical_reason().unwrap_or("unknown status").to_string()
        } else {
            message
        },
    }
}

#[derive(Debug, Serialize)]
struct RevokeCertificateBody<'a> {
    /// Base64 (standard alphabet) DER
    cert: String,
    code: i64,
    admin_name: &'a str,
}

#[derive(Debug, Serialize)]
struct RevokeByDomainBody<'a> {
    identifier: &'a Identifier,
}

#[derive(Debug, Deserialize)]
struct RevokeByDomainReply {
    finalized: i64,
    pending: i64,
}

/// Registration authority over HTTP
#[derive(Clone)]
pub struct HttpRegistrationAuthority {
    http_client: Client,
    base_url: String,
}

impl HttpRegistrationAuthority {
    pub fn new(service: &ServiceConfig, tls: Option<&TlsMaterial>) -> Result<Self, AuthorityError> {
        Ok(Self {
            http_client: build_http_client(service, tls)?,
            base_url: service.address.clone(),
        })
    }
}

#[async_trait]
impl RegistrationAuthority for HttpRegistrationAuthority {
    async fn administratively_revoke_certificate(
        &self,
        certificate: &ParsedCertificate,
        reason: RevocationReason,
        admin_name: &str,
    ) -> Result<(), AuthorityError> {
        let body = RevokeCertificateBody {
            cert: STANDARD.encode(&certificate.der),
            code: i64::from(reason.code()),
            admin_name,
        };

        let response = self
            .http_client
            .post(endpoint(&self.base_url, "admin/revoke-certificate"))
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        debug!(serial = %certificate.serial, "RA accepted revocation");
        Ok(())
    }
}

/// Storage authority over HTTP
#[derive(Clone)]
pub struct HttpStorageAuthority {
    http_client: Client,
    base_url: String,
}

impl HttpStorageAuthority {
    pub fn new(service: &ServiceConfig, tls: Option<&TlsMaterial>) -> Result<Self, AuthorityError> {
        Ok(Self {
            http_client: build_http_client(service, tls)?,
            base_url: service.address.clone(),
        })
    }
}

#[async_trait]
impl StorageAuthority for HttpStorageAuthority {
    async fn get_registration(&self, id: i64) -> Result<Option<Registration>, AuthorityError> {
        let response = self
            .http_client
            .get(endpoint(&self.base_url, &format!("registrations/{}", id)))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Registration>().await?)),
            _ => Err(status_error(response).await),
        }
    }

    async fn revoke_authorizations_by_domain(
        &self,
        identifier: &Identifier,
    ) -> Result<RevokedAuthorizations, AuthorityError> {
        let response = self
            .http_client
            .post(endpoint(&self.base_url, "authorizations/revoke-by-domain"))
            .header(header::ACCEPT, "application/json")
            .json(&RevokeByDomainBody { identifier })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let reply: RevokeByDomainReply = response.json().await?;
        Ok(RevokedAuthorizations {
            valid: reply.finalized,
            pending: reply.pending,
        })
    }
}
