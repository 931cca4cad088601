//! Persisted state slots.
//!
//! A small subset of client state survives restarts: the token pair, the
//! authenticated-user snapshot and the current project selection. Each lives
//! under its own named slot. Everything else (project listings, loading
//! flags, transient errors) is rebuilt by refetching.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::ApiError;

/// Slot names for the persisted state subset.
pub mod slots {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const AUTH_STATE: &str = "auth-storage";
    pub const PROJECT_STATE: &str = "project-store";
}

/// Keyed storage for the persisted state subset.
pub trait Storage: Send + Sync {
    fn read(&self, slot: &str) -> Result<Option<String>, ApiError>;
    fn write(&self, slot: &str, value: &str) -> Result<(), ApiError>;
    fn remove(&self, slot: &str) -> Result<(), ApiError>;
}

/// Storage backed by one file per slot under a directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(slot)
    }
}

impl Storage for FileStorage {
    fn read(&self, slot: &str) -> Result<Option<String>, ApiError> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|err| ApiError::Storage(format!("read {}: {}", path.display(), err)))
    }

    fn write(&self, slot: &str, value: &str) -> Result<(), ApiError> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| ApiError::Storage(format!("create {}: {}", self.dir.display(), err)))?;
        let path = self.slot_path(slot);
        fs::write(&path, value)
            .map_err(|err| ApiError::Storage(format!("write {}: {}", path.display(), err)))
    }

    fn remove(&self, slot: &str) -> Result<(), ApiError> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(());
        }
        fs::remove_file(&path)
            .map_err(|err| ApiError::Storage(format!("remove {}: {}", path.display(), err)))
    }
}

/// In-memory storage for tests and ephemeral embedders.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, slot: &str) -> Result<Option<String>, ApiError> {
        Ok(self
            .slots
            .lock()
            .expect("storage lock poisoned")
            .get(slot)
            .cloned())
    }

    fn write(&self, slot: &str, value: &str) -> Result<(), ApiError> {
        self.slots
            .lock()
            .expect("storage lock poisoned")
            .insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), ApiError> {
        self.slots
            .lock()
            .expect("storage lock poisoned")
            .remove(slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.read(slots::ACCESS_TOKEN).unwrap(), None);

        storage.write(slots::ACCESS_TOKEN, "T1").unwrap();
        assert_eq!(
            storage.read(slots::ACCESS_TOKEN).unwrap().as_deref(),
            Some("T1")
        );

        storage.remove(slots::ACCESS_TOKEN).unwrap();
        assert_eq!(storage.read(slots::ACCESS_TOKEN).unwrap(), None);
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        assert_eq!(storage.read(slots::REFRESH_TOKEN).unwrap(), None);

        storage.write(slots::REFRESH_TOKEN, "R1").unwrap();
        assert_eq!(
            storage.read(slots::REFRESH_TOKEN).unwrap().as_deref(),
            Some("R1")
        );

        // removing twice is fine
        storage.remove(slots::REFRESH_TOKEN).unwrap();
        storage.remove(slots::REFRESH_TOKEN).unwrap();
        assert_eq!(storage.read(slots::REFRESH_TOKEN).unwrap(), None);
    }
}
