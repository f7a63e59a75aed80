//! OS credential-store backend
//!
//! Each key becomes its own keyring entry under the service
//! `oidc-session-{namespace}`, with the key as the account name.

use crate::error::{Result, SessionError};
use crate::storage::KeyValueStore;

/// Key-value store backed by the platform keyring (Keychain, Secret
/// Service, Windows Credential Manager).
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Creates a store whose entries live under `oidc-session-{namespace}`.
    pub fn new(namespace: &str) -> Self {
        Self {
            service: format!("oidc-session-{}", namespace),
        }
    }

    /// The keyring service name used for every entry.
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        Ok(keyring::Entry::new(&self.service, key).map_err(SessionError::Keyring)?)
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SessionError::Keyring(e).into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(SessionError::Keyring)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SessionError::Keyring(e).into()),
        }
    }
}
