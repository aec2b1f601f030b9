//! Bearer token persistence
//!
//! Exactly one credential (`ExeMetaDataExtractor` / `JWT`) lives in the
//! platform secret store. Absence means logged out. Saving `None` or an
//! empty string deletes it; deleting a missing credential succeeds.

use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// Credential store resource (service) name
pub const CREDENTIAL_RESOURCE: &str = "ExeMetaDataExtractor";

/// Credential store account name
pub const CREDENTIAL_ACCOUNT: &str = "JWT";

/// Secure-store failures
///
/// Callers in the session manager absorb these into "not authenticated".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    #[error("Credential store access failed: {0}")]
    Access(String),
}

/// Single-slot bearer token storage
///
/// Implementations are responsible for their own internal consistency;
/// callers do not lock around them.
pub trait TokenStore: Send + Sync {
    /// Upsert `token`, or delete the stored token when `None`/empty
    fn save(&self, token: Option<&str>) -> Result<(), StoreError>;

    /// Currently stored token, `None` when nothing is stored
    fn get(&self) -> Result<Option<String>, StoreError>;

    fn clear(&self) -> Result<(), StoreError> {
        self.save(None)
    }
}

/// Token store backed by the OS credential manager via `keyring`
#[derive(Debug)]
pub struct KeyringTokenStore {
    entry: keyring::Entry,
}

impl KeyringTokenStore {
    /// Open the default `ExeMetaDataExtractor` / `JWT` entry
    pub fn new() -> Result<Self, StoreError> {
        Self::with_names(CREDENTIAL_RESOURCE, CREDENTIAL_ACCOUNT)
    }

    pub fn with_names(resource: &str, account: &str) -> Result<Self, StoreError> {
        let entry = keyring::Entry::new(resource, account)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn save(&self, token: Option<&str>) -> Result<(), StoreError> {
        match token.filter(|t| !t.is_empty()) {
            Some(token) => self
                .entry
                .set_password(token)
                .map_err(|e| StoreError::Access(e.to_string())),
            None => match self.entry.delete_credential() {
                Ok(()) => Ok(()),
                Err(keyring::Error::NoEntry) => {
                    debug!("No stored credential to remove");
                    Ok(())
                }
                Err(e) => Err(StoreError::Access(e.to_string())),
            },
        }
    }

    fn get(&self) -> Result<Option<String>, StoreError> {
        match self.entry.get_password() {
            Ok(token) if token.is_empty() => Ok(None),
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::Access(e.to_string())),
        }
    }
}

/// In-process token store
///
/// Used by tests and by shells that must not touch the OS store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, token: Option<&str>) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = token.filter(|t| !t.is_empty()).map(str::to_string);
        Ok(())
    }

    fn get(&self) -> Result<Option<String>, StoreError> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_keyring_store() -> KeyringTokenStore {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        KeyringTokenStore::with_names("exmeta-test", "JWT").unwrap()
    }

    fn check_store_contract(store: &dyn TokenStore) {
        // Delete with nothing stored is a success
        store.save(None).unwrap();
        assert_eq!(store.get().unwrap(), None);

        store.save(Some("X")).unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("X"));

        // Upsert, not append
        store.save(Some("Y")).unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("Y"));

        // Empty string means delete
        store.save(Some("")).unwrap();
        assert_eq!(store.get().unwrap(), None);

        store.save(Some("Z")).unwrap();
        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn test_memory_store_contract() {
        check_store_contract(&MemoryTokenStore::new());
    }

    #[test]
    fn test_keyring_store_contract() {
        check_store_contract(&mock_keyring_store());
    }

    #[test]
    fn test_memory_store_with_token() {
        let store = MemoryTokenStore::with_token("seed");
        assert_eq!(store.get().unwrap().as_deref(), Some("seed"));
    }
}
