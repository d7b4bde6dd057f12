//! services/client/src/adapters/file_storage.rs
//!
//! Durable client-local storage backed by a directory: one file per key.
//! Implements the `StateStorage` port from the `core` crate.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tarot_reading_core::ports::{PortError, PortResult, StateStorage};

/// A `StateStorage` that keeps each key in `<dir>/<key>`.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (and creates, if needed) the storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PortResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PortError::Storage(format!("invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(key))
    }
}

impl StateStorage for FileStorage {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Storage(e.to_string())),
        }
    }

    // Write-then-rename so a crash never leaves a half-written partition.
    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).map_err(|e| PortError::Storage(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| PortError::Storage(e.to_string()))
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Storage(e.to_string())),
        }
    }
}
