//! Channel-manager API key lookup.
//!
//! The key lives in the OS keyring; the environment variable named in the
//! configuration is the fallback for headless machines.

use tracing::debug;

use crate::error::SyncError;

/// Keyring entry holding the channel-manager API key.
pub const API_KEY_ENTRY: &str = "channel_manager_api_key";

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    use crate::error::SyncError;

    const SERVICE: &str = "rategrid";

    pub fn get(key: &str) -> Result<Option<String>, SyncError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), SyncError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    pub fn delete(key: &str) -> Result<(), SyncError> {
        let entry = keyring::Entry::new(SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Resolve the API key: keyring first, then `env_var`.
///
/// An unusable keyring (no backend on this machine) is not fatal; the
/// environment is still consulted.
pub fn api_key(env_var: &str) -> Result<String, SyncError> {
    let stored = match keyring_store::get(API_KEY_ENTRY) {
        Ok(stored) => stored,
        Err(e) => {
            debug!(error = %e, "keyring unavailable, falling back to environment");
            None
        }
    };
    let from_env = if env_var.is_empty() {
        None
    } else {
        std::env::var(env_var).ok()
    };
    resolve_api_key(stored, from_env)
}

fn resolve_api_key(stored: Option<String>, from_env: Option<String>) -> Result<String, SyncError> {
    stored
        .into_iter()
        .chain(from_env)
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
        .ok_or(SyncError::MissingCredentials)
}
