//! Device-local secure storage for the session token.
//!
//! The client persists exactly one secret, the raw bearer token, under
//! [`TOKEN_KEY`]. Backends:
//! - [`FileTokenStorage`] - one 0600 file per key, written atomically
//! - [`KeyringTokenStorage`] - the system credential store (`system-keyring` feature)
//! - [`MemoryTokenStorage`] - process-local, for tests and one-shot commands

pub mod file;
pub mod keyring;
pub mod memory;

pub use file::FileTokenStorage;
pub use memory::MemoryTokenStorage;

#[cfg(feature = "system-keyring")]
pub use keyring::KeyringTokenStorage;

use std::sync::Arc;

use crate::config::{ClientConfig, StorageBackend};

/// Storage key of the persisted bearer token.
pub const TOKEN_KEY: &str = "auth_token";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Keyring error: {0}")]
    Keyring(String),

    #[error("Storage backend '{0}' is not available in this build")]
    Unavailable(String),
}

impl StorageError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Key-value store for client secrets.
///
/// All implementations must be thread-safe (`Send + Sync`). Removing a key
/// that is not present succeeds.
pub trait TokenStorage: Send + Sync {
    /// Load the value stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Name of this storage backend, for logging.
    fn name(&self) -> &str;
}

impl<T: TokenStorage + ?Sized> TokenStorage for Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).save(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: TokenStorage + ?Sized> TokenStorage for Box<T> {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).load(key)
    }
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).save(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the storage backend selected in the client config.
pub fn storage_from_config(config: &ClientConfig) -> Result<Arc<dyn TokenStorage>, StorageError> {
    let storage: Arc<dyn TokenStorage> = match config.storage_backend {
        StorageBackend::File => Arc::new(FileTokenStorage::new(&config.token_storage_dir)),
        StorageBackend::Memory => Arc::new(MemoryTokenStorage::new()),
        #[cfg(feature = "system-keyring")]
        StorageBackend::Keyring => Arc::new(KeyringTokenStorage::new()),
        #[cfg(not(feature = "system-keyring"))]
        StorageBackend::Keyring => {
            return Err(StorageError::Unavailable("keyring".to_string()));
        }
    };
    tracing::debug!(backend = storage.name(), "Token storage ready");
    Ok(storage)
}
