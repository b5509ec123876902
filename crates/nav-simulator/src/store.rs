//! Persisted session selection.
//!
//! Only the operator's choices survive a restart: which waypoints, which
//! vehicle, and whether navigation was active. Route geometry and simulation
//! state are always rebuilt by starting a fresh run.

use crate::error::Result;
use nav_domain::VehicleCategory;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// The persisted subset of a navigation session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedSelection {
    pub start_id: String,
    pub end_id: String,
    pub vehicle: VehicleCategory,
    pub is_navigating: bool,
}

/// Key-value boundary for the persisted selection.
pub trait SelectionStore {
    /// Read the last saved selection, `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read or decoded.
    fn load(&self) -> Result<Option<PersistedSelection>>;

    /// Replace the saved selection.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be written.
    fn save(&mut self, selection: &PersistedSelection) -> Result<()>;
}

/// Process-local store, used when no state file is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    saved: Option<PersistedSelection>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedSelection>> {
        Ok(self.saved.clone())
    }

    fn save(&mut self, selection: &PersistedSelection) -> Result<()> {
        self.saved = Some(selection.clone());
        Ok(())
    }
}

/// Selection stored as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SelectionStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedSelection>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self, selection: &PersistedSelection) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(selection)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulatorError;

    fn sample() -> PersistedSelection {
        PersistedSelection {
            start_id: "phx".into(),
            end_id: "tucson".into(),
            vehicle: VehicleCategory::Truck,
            is_navigating: true,
        }
    }

    #[test]
    fn test_memory_store_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
    }

    #[test]
    fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_json_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("route-state.json");

        let mut first = JsonFileStore::new(&path);
        first.save(&sample()).unwrap();

        let second = JsonFileStore::new(&path);
        assert_eq!(second.load().unwrap(), Some(sample()));

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"vehicle\": \"truck\""));
    }

    #[test]
    fn test_json_store_partial_document_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"start_id":"mesa"}"#).unwrap();

        let loaded = JsonFileStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded.start_id, "mesa");
        assert_eq!(loaded.vehicle, VehicleCategory::Car);
        assert!(!loaded.is_navigating);
    }

    #[test]
    fn test_json_store_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SimulatorError::Serialization(_)));
    }
}
