//! Administrative revocation of issued certificates and authorizations.
//!
//! The binary in `main.rs` is a thin CLI over [`commands::Dispatcher`];
//! everything else is usable as a library.

pub mod admin;
pub mod audit;
pub mod authority;
pub mod certificate;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod reasons;
pub mod storage;

pub use commands::{Command, CommandOutcome, Dispatcher};
pub use error::{AuthorityError, ConfigError, Result, RevokerError, StoreError};
pub use orchestrator::{RevocationOrchestrator, RevokedCertificate};
pub use reasons::RevocationReason;
