// admin-revoker-rs/src/commands.rs
//
// Operator commands and the dispatcher that runs them. The dispatcher owns
// the store transaction of each command: one begin, then exactly one commit
// or rollback. Every store operation is time bounded.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::authority::{Identifier, RevokedAuthorizations};
use crate::error::{Result, RevokerError};
use crate::orchestrator::{RevocationOrchestrator, RevokedCertificate};
use crate::storage::{self, CertificateStore, StoreTransaction, DEFAULT_QUERY_TIMEOUT};

/// Operator commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SerialRevoke { serial: String, reason_code: i64 },
    RegRevoke { registration_id: i64, reason_code: i64 },
    ListReasons,
    AuthRevoke { domain: String },
}

impl Command {
    /// Subcommand name as typed by the operator
    pub fn name(&self) -> &'static str {
        match self {
            Command::SerialRevoke { .. } => "serial-revoke",
            Command::RegRevoke { .. } => "reg-revoke",
            Command::ListReasons => "list-reasons",
            Command::AuthRevoke { .. } => "auth-revoke",
        }
    }
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    CertificateRevoked(RevokedCertificate),
    RegistrationRevoked {
        registration_id: i64,
        certificates: Vec<RevokedCertificate>,
    },
    Reasons(Vec<(u8, &'static str)>),
    AuthorizationsRevoked {
        domain: String,
        revoked: RevokedAuthorizations,
    },
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::CertificateRevoked(certificate) => writeln!(
                f,
                "Revoked certificate {} with reason '{}'",
                certificate.serial, certificate.reason
            ),
            CommandOutcome::RegistrationRevoked {
                registration_id,
                certificates,
            } => {
                writeln!(
                    f,
                    "Revoked {} certificates for registration {}",
                    certificates.len(),
                    registration_id
                )?;
                for certificate in certificates {
                    writeln!(f, "  {} ({})", certificate.serial, certificate.reason)?;
                }
                Ok(())
            }
            CommandOutcome::Reasons(reasons) => {
                write!(f, "Revocation reason codes\n-----------------------\n\n")?;
                for (code, label) in reasons {
                    writeln!(f, "{}: {}", code, label)?;
                }
                Ok(())
            }
            CommandOutcome::AuthorizationsRevoked { domain, revoked } => writeln!(
                f,
                "Revoked {} pending authorizations and {} final authorizations for {}",
                revoked.pending, revoked.valid, domain
            ),
        }
    }
}

/// Runs commands against the orchestrator
pub struct Dispatcher {
    orchestrator: RevocationOrchestrator,
    store: Arc<dyn CertificateStore>,
    admin: String,
    store_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        orchestrator: RevocationOrchestrator,
        store: Arc<dyn CertificateStore>,
        admin: impl Into<String>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            admin: admin.into(),
            store_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Bound each begin, query, commit and rollback by `limit`
    pub fn with_store_timeout(mut self, limit: Duration) -> Self {
        self.store_timeout = limit;
        self
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(storage::begin_bounded(self.store.as_ref(), self.store_timeout).await?)
    }

    pub async fn run(&self, command: Command) -> Result<CommandOutcome> {
        info!(command = command.name(), admin = %self.admin, "Running command");

        match command {
            Command::SerialRevoke { serial, reason_code } => {
                let mut tx = self.begin().await?;
                let result = self
                    .orchestrator
                    .revoke_by_serial(tx.as_mut(), &serial, reason_code, &self.admin)
                    .await;
                let certificate = resolve(tx, result).await?;
                Ok(CommandOutcome::CertificateRevoked(certificate))
            }
            Command::RegRevoke {
                registration_id,
                reason_code,
            } => {
                let mut tx = self.begin().await?;
                let result = self
                    .orchestrator
                    .revoke_by_registration(tx.as_mut(), registration_id, reason_code, &self.admin)
                    .await;
                let certificates = resolve(tx, result).await?;
                Ok(CommandOutcome::RegistrationRevoked {
                    registration_id,
                    certificates,
                })
            }
            Command::ListReasons => Ok(CommandOutcome::Reasons(self.orchestrator.list_reasons())),
            Command::AuthRevoke { domain } => {
                let identifier = Identifier::dns(domain.as_str());
                let revoked = self
                    .orchestrator
                    .revoke_authorizations_by_domain(&identifier)
                    .await?;
                Ok(CommandOutcome::AuthorizationsRevoked { domain, revoked })
            }
        }
    }
}

/// Commit on success, roll back on failure. A failed rollback is logged and
/// the original error wins.
async fn resolve<T>(tx: Box<dyn StoreTransaction>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!(error = %rollback_err, "Failed to roll back transaction");
            }
            if let RevokerError::CascadeAborted { revoked, .. } = &err {
                error!(
                    already_revoked = ?revoked,
                    "Local transaction rolled back; remote revocations remain in effect"
                );
            }
            Err(err)
        }
    }
}
