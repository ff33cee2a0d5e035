//! Keyring-based token storage.

#[cfg(feature = "system-keyring")]
use super::{StorageError, TokenStorage};
#[cfg(feature = "system-keyring")]
use tracing::instrument;

/// Token storage in the system's native credential store.
///
/// Feature-gated behind `system-keyring`. Uses the macOS Keychain, the
/// Windows Credential Manager, or the Linux kernel keyutils store.
#[cfg(feature = "system-keyring")]
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    service: String,
}

#[cfg(feature = "system-keyring")]
impl Default for KeyringTokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "system-keyring")]
impl KeyringTokenStorage {
    const SERVICE_NAME: &str = "passage";

    pub fn new() -> Self {
        Self::with_service(Self::SERVICE_NAME)
    }

    /// Use a custom service name, e.g. one per deployment.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, StorageError> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| StorageError::Keyring(format!("Failed to create keyring entry: {e}")))
    }
}

#[cfg(feature = "system-keyring")]
impl TokenStorage for KeyringTokenStorage {
    #[instrument(skip(self))]
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Keyring(e.to_string())),
        }
    }

    #[instrument(skip(self, value))]
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| StorageError::Keyring(e.to_string()))
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::Keyring(e.to_string())),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
