// admin-revoker-rs/src/authority/grpc.rs
//
// gRPC clients for the registration and storage authorities.

use async_trait::async_trait;
use authority_proto::{
    AdministrativelyRevokeCertificateRequest, RegistrationAuthorityClient, RegistrationId,
    RevokeAuthorizationsByDomainRequest, StorageAuthorityClient,
};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint, Identity};
use tonic::{Code, Request};
use tracing::debug;

use super::{
    Identifier, Registration, RegistrationAuthority, RevokedAuthorizations, StorageAuthority,
    TlsMaterial,
};
use crate::certificate::ParsedCertificate;
use crate::config::ServiceConfig;
use crate::error::AuthorityError;
use crate::reasons::RevocationReason;

/// Build a lazily connected channel for one authority. An `https://` address
/// without configured TLS verifies against the public web PKI roots.
pub fn channel(service: &ServiceConfig, tls: Option<&TlsMaterial>) -> Result<Channel, AuthorityError> {
    let mut endpoint = Endpoint::from_shared(service.address.clone())?
        .timeout(service.timeout())
        .connect_timeout(service.timeout());

    if let Some(tls) = tls {
        endpoint = endpoint.tls_config(client_tls_config(tls))?;
    } else if service.address.starts_with("https://") {
        endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
    }

    Ok(endpoint.connect_lazy())
}

fn client_tls_config(tls: &TlsMaterial) -> ClientTlsConfig {
    let mut config = ClientTlsConfig::new();
    config = match &tls.ca_cert_pem {
        Some(ca) => config.ca_certificate(Certificate::from_pem(ca)),
        None => config.with_webpki_roots(),
    };
    if let Some((cert, key)) = tls.identity() {
        config = config.identity(Identity::from_pem(cert, key));
    }
    if let Some(name) = &tls.server_name {
        config = config.domain_name(name.clone());
    }
    config
}

/// Registration authority over gRPC
#[derive(Clone)]
pub struct GrpcRegistrationAuthority {
    client: RegistrationAuthorityClient<Channel>,
}

impl GrpcRegistrationAuthority {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: RegistrationAuthorityClient::new(channel),
        }
    }
}

#[async_trait]
impl RegistrationAuthority for GrpcRegistrationAuthority {
    async fn administratively_revoke_certificate(
        &self,
        certificate: &ParsedCertificate,
        reason: RevocationReason,
        admin_name: &str,
    ) -> Result<(), AuthorityError> {
        let request = Request::new(AdministrativelyRevokeCertificateRequest {
            cert: certificate.der.clone(),
            code: i64::from(reason.code()),
            admin_name: admin_name.to_string(),
        });

        let mut client = self.client.clone();
        client.administratively_revoke_certificate(request).await?;

        debug!(serial = %certificate.serial, "RA accepted revocation");
        Ok(())
    }
}

/// Storage authority over gRPC
#[derive(Clone)]
pub struct GrpcStorageAuthority {
    client: StorageAuthorityClient<Channel>,
}

impl GrpcStorageAuthority {
    pub fn new(channel: Channel) -> Self {
        Self {
            client: StorageAuthorityClient::new(channel),
        }
    }
}

#[async_trait]
impl StorageAuthority for GrpcStorageAuthority {
    async fn get_registration(&self, id: i64) -> Result<Option<Registration>, AuthorityError> {
        let mut client = self.client.clone();
        match client.get_registration(Request::new(RegistrationId { id })).await {
            Ok(response) => {
                let registration = response.into_inner();
                Ok(Some(Registration {
                    id: registration.id,
                    contact: registration.contact,
                    status: registration.status,
                }))
            }
            Err(status) if status.code() == Code::NotFound => Ok(None),
            Err(status) => Err(status.into()),
        }
    }

    async fn revoke_authorizations_by_domain(
        &self,
        identifier: &Identifier,
    ) -> Result<RevokedAuthorizations, AuthorityError> {
        let request = Request::new(RevokeAuthorizationsByDomainRequest {
            identifier: Some(authority_proto::Identifier {
                r#type: identifier.kind.to_string(),
                value: identifier.value.clone(),
            }),
        });

        let mut client = self.client.clone();
        let response = client.revoke_authorizations_by_domain(request).await?.into_inner();

        Ok(RevokedAuthorizations {
            valid: response.finalized,
            pending: response.pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_rejects_invalid_address() {
        let service = ServiceConfig {
            address: "not a uri".to_string(),
            timeout_ms: 100,
        };
        assert!(matches!(channel(&service, None), Err(AuthorityError::Transport(_))));
    }

    #[tokio::test]
    async fn test_https_without_tls_section_gets_a_root_store() {
        let service = ServiceConfig {
            address: "https://ra.internal:9094".to_string(),
            timeout_ms: 100,
        };
        assert!(channel(&service, None).is_ok());

        let material = TlsMaterial {
            ca_cert_pem: None,
            cert_pem: None,
            key_pem: None,
            server_name: Some("ra.internal".to_string()),
        };
        assert!(channel(&service, Some(&material)).is_ok());
    }
}
