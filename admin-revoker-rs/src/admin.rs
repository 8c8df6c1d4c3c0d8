// admin-revoker-rs/src/admin.rs
//
// Administrator identity recorded with every revocation. The account the
// process runs as is authoritative; the environment is only consulted when
// the account lookup fails.

use tracing::{debug, warn};

use crate::error::ConfigError;

/// Variables consulted, in order, when the account lookup fails
pub const IDENTITY_VARS: [&str; 3] = ["USER", "USERNAME", "LOGNAME"];

/// Login name of the account the process runs as, from the user database
pub fn os_account_name() -> Option<String> {
    match whoami::fallible::username() {
        Ok(name) => Some(name.trim().to_string()).filter(|name| !name.is_empty()),
        Err(e) => {
            debug!(error = %e, "Account lookup for the current uid failed");
            None
        }
    }
}

/// Resolve the administrator name, unless an explicit override is given
pub fn resolve_admin_identity(override_name: Option<String>) -> Result<String, ConfigError> {
    resolve_from(override_name, os_account_name(), |var| std::env::var(var).ok())
}

/// Resolve from a known account name and a caller-supplied environment lookup
pub fn resolve_from<F>(
    override_name: Option<String>,
    account: Option<String>,
    lookup: F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(name) = override_name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::ValidationError("--admin must not be empty".to_string()));
        }
        if let Some(account) = account.as_deref().filter(|account| *account != name) {
            warn!(admin = %name, account = %account, "Administrator override differs from the invoking account");
        }
        return Ok(name.to_string());
    }

    if let Some(account) = account {
        return Ok(account);
    }

    let name = IDENTITY_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or_else(|| {
            ConfigError::AccessError(format!(
                "Could not determine the administrator name from the process account or {}; pass --admin",
                IDENTITY_VARS.join(", ")
            ))
        })?;

    warn!(admin = %name, "Account lookup failed; administrator name taken from the environment");
    Ok(name)
}
