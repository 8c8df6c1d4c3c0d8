// admin-revoker-rs/src/error.rs
//
// Error taxonomy for revocation operations. Nothing here is retried
// automatically; every variant terminates the current command.

use std::time::Duration;

use thiserror::Error;

/// Result type for revocation operations
pub type Result<T, E = RevokerError> = std::result::Result<T, E>;

/// Errors surfaced by the orchestrator and the command dispatcher
#[derive(Error, Debug)]
pub enum RevokerError {
    /// Reason code outside the assigned CRLReason set
    #[error("Invalid reason code: {0}")]
    InvalidReason(i64),

    /// Serial or registration does not exist
    #[error("{0}")]
    NotFound(String),

    /// Stored certificate bytes do not decode
    #[error("Malformed certificate {serial}: {reason}")]
    MalformedCertificate { serial: String, reason: String },

    /// The remote authority returned an error
    #[error("Remote call failed: {0}")]
    RemoteCallFailure(#[from] AuthorityError),

    /// Transaction begin/query/commit/rollback failure
    #[error("Store failure: {0}")]
    StoreFailure(#[from] StoreError),

    /// A registration cascade stopped at its first failure. Serials in
    /// `revoked` are already revoked in the authority and stay revoked.
    #[error(
        "Revocation of registration {registration_id} aborted at certificate {failed_serial} \
         ({} already revoked remotely)", .revoked.len()
    )]
    CascadeAborted {
        registration_id: i64,
        revoked: Vec<String>,
        failed_serial: String,
        source: Box<RevokerError>,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RevokerError {
    /// The innermost error of a cascade, or `self`
    pub fn root(&self) -> &RevokerError {
        match self {
            RevokerError::CascadeAborted { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), RevokerError::NotFound(_))
    }
}

/// Errors from the certificate store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Store {operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// Errors from the remote authorities, whatever the transport
#[derive(Error, Debug)]
pub enum AuthorityError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authority returned {code}: {message}")]
    Status { code: String, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl From<tonic::Status> for AuthorityError {
    fn from(status: tonic::Status) -> Self {
        AuthorityError::Status {
            code: format!("{:?}", status.code()),
            message: status.message().to_string(),
        }
    }
}

impl From<tonic::transport::Error> for AuthorityError {
    fn from(err: tonic::transport::Error) -> Self {
        AuthorityError::Transport(err.to_string())
    }
}

impl From<reqwest::Error> for AuthorityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthorityError::InvalidResponse(err.to_string())
        } else {
            AuthorityError::Transport(err.to_string())
        }
    }
}

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    #[error("Configuration access error: {0}")]
    AccessError(String),
}
