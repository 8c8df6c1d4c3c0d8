// admin-revoker-rs/src/main.rs
//
// admin-revoker: operator CLI for administrative revocation.
//
// Commands:
// - serial-revoke <serial> <reason-code>
// - reg-revoke <registration-id> <reason-code>
// - list-reasons
// - auth-revoke <domain>

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;

use admin_revoker::audit::TracingAuditReporter;
use admin_revoker::config::Config;
use admin_revoker::{admin, authority, logging, reasons, storage};
use admin_revoker::{Command, CommandOutcome, Dispatcher, RevocationOrchestrator};

#[derive(Debug, Parser)]
#[command(name = "admin-revoker", version, about = "Administrative certificate and authorization revocation")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Path to the configuration file (.json, .yaml, .yml or .toml)
    #[arg(long, value_name = "PATH")]
    config: PathBuf,

    /// Administrator name recorded with revocations (defaults to the login name)
    #[arg(long, value_name = "NAME")]
    admin: Option<String>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Revoke a single certificate by hex serial number
    #[command(name = "serial-revoke")]
    SerialRevoke {
        #[command(flatten)]
        common: CommonArgs,
        serial: String,
        #[arg(allow_negative_numbers = true)]
        reason_code: i64,
    },

    /// Revoke every certificate owned by a registration
    #[command(name = "reg-revoke")]
    RegRevoke {
        #[command(flatten)]
        common: CommonArgs,
        registration_id: i64,
        #[arg(allow_negative_numbers = true)]
        reason_code: i64,
    },

    /// List the accepted revocation reason codes
    #[command(name = "list-reasons")]
    ListReasons {
        /// Accepted for symmetry with the other commands; not read
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Revoke all pending and valid authorizations for a domain
    #[command(name = "auth-revoke")]
    AuthRevoke {
        #[command(flatten)]
        common: CommonArgs,
        domain: String,
    },
}

impl CliCommand {
    fn into_parts(self) -> (Option<CommonArgs>, Command) {
        match self {
            CliCommand::SerialRevoke { common, serial, reason_code } => {
                (Some(common), Command::SerialRevoke { serial, reason_code })
            }
            CliCommand::RegRevoke { common, registration_id, reason_code } => (
                Some(common),
                Command::RegRevoke { registration_id, reason_code },
            ),
            CliCommand::ListReasons { .. } => (None, Command::ListReasons),
            CliCommand::AuthRevoke { common, domain } => (Some(common), Command::AuthRevoke { domain }),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    execute(Cli::parse()).await
}

/// Run one command and report its failure. The log file guard outlives the
/// failure report so the final line reaches the file.
async fn execute(cli: Cli) -> ExitCode {
    let mut log_guard = None;

    let code = match run(cli, &mut log_guard).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{:#}", err), "Command failed");
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    };

    drop(log_guard);
    code
}

async fn run(cli: Cli, log_guard: &mut Option<WorkerGuard>) -> anyhow::Result<()> {
    let (common, command) = cli.command.into_parts();

    let Some(common) = common else {
        // list-reasons needs neither configuration nor connections.
        print!("{}", CommandOutcome::Reasons(reasons::all()));
        return Ok(());
    };

    let dispatcher = bootstrap(&common.config, common.admin, log_guard).await?;
    let outcome = dispatcher.run(command).await?;
    print!("{}", outcome);
    Ok(())
}

async fn bootstrap(
    config_path: &Path,
    admin_override: Option<String>,
    log_guard: &mut Option<WorkerGuard>,
) -> anyhow::Result<Dispatcher> {
    let config = Config::load(config_path)
        .await
        .with_context(|| format!("Reading configuration from {}", config_path.display()))?;

    *log_guard = logging::init_logging(&config.logging)?;

    let admin = admin::resolve_admin_identity(admin_override)?;

    let store = storage::create_certificate_store(&config.revoker.db)
        .await
        .context("Couldn't setup database connection")?;

    let clients = authority::connect(&config.revoker)
        .await
        .context("Failed to create authority clients")?;

    let orchestrator = RevocationOrchestrator::new(
        clients.registration_authority,
        clients.storage_authority,
        Arc::new(TracingAuditReporter::new()),
    );

    Ok(Dispatcher::new(orchestrator, store, admin).with_store_timeout(config.revoker.db.query_timeout()))
}
