//! File-based token storage.

use super::{StorageError, TokenStorage};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// File permissions for token files (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Stores each value as a plain file named after its key: `{dir}/{key}`.
///
/// On Unix the file is created 0600 and its directory 0700. Writes go to a
/// temp file that is renamed over the target.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    dir: PathBuf,
}

impl FileTokenStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if self.dir.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StorageError::io(
                format!("Failed to create token directory '{}'", self.dir.display()),
                e,
            )
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(DIR_MODE))
                .map_err(|e| {
                    StorageError::io(
                        format!("Failed to set permissions on '{}'", self.dir.display()),
                        e,
                    )
                })?;
        }
        Ok(())
    }

    fn write_temp(&self, temp_path: &Path, value: &str) -> Result<(), StorageError> {
        let context = || format!("Failed to write temp file '{}'", temp_path.display());

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(FILE_MODE)
                .open(temp_path)
                .map_err(|e| StorageError::io(context(), e))?;
            file.write_all(value.as_bytes())
                .and_then(|()| file.sync_all())
                .map_err(|e| StorageError::io(context(), e))?;
        }

        #[cfg(not(unix))]
        std::fs::write(temp_path, value).map_err(|e| StorageError::io(context(), e))?;

        Ok(())
    }
}

impl TokenStorage for FileTokenStorage {
    #[instrument(skip(self))]
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.key_path(key)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::io(
                    format!("Failed to read token file '{}'", path.display()),
                    e,
                ));
            }
        };

        let value = content.trim();
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(value.to_string()))
    }

    #[instrument(skip(self, value))]
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        self.ensure_dir()?;

        let temp_path = path.with_extension("tmp");
        self.write_temp(&temp_path, value)?;

        if let Err(e) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::io(
                format!("Failed to rename '{}' to '{}'", temp_path.display(), path.display()),
                e,
            ));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(
                format!("Failed to remove token file '{}'", path.display()),
                e,
            )),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}
