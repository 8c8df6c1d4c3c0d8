//! Generated bindings for `.proto/authority.proto`.

pub mod authority {
    tonic::include_proto!("authority");
}

pub use authority::{
    registration_authority_client::RegistrationAuthorityClient,
    storage_authority_client::StorageAuthorityClient,
    AdministrativelyRevokeCertificateRequest, Empty, Identifier, Registration, RegistrationId,
    RevokeAuthorizationsByDomainRequest, RevokeAuthorizationsByDomainResponse,
};
