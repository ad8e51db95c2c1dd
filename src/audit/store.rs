//! Local audit trail persistence.
//!
//! A trail is saved after every append so an interrupted submission can be
//! inspected later. It is cleared when the submission finalizes or is
//! explicitly abandoned.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use super::trail::AuditTrail;

#[derive(Debug, Error)]
pub enum AuditStoreError {
    #[error("Audit store I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Audit trail {id} is corrupt: {source}")]
    Corrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode audit trail: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Invalid audit trail id {0:?}")]
    InvalidId(String),
}

/// Keyed store for in-flight audit trails.
pub trait AuditStore: Send + Sync {
    fn save(&self, trail: &AuditTrail) -> Result<(), AuditStoreError>;

    fn load(&self, id: &str) -> Result<Option<AuditTrail>, AuditStoreError>;

    fn clear(&self, id: &str) -> Result<(), AuditStoreError>;

    /// Ids of every trail currently held.
    fn list(&self) -> Result<Vec<String>, AuditStoreError>;
}

/// One JSON document per trail in a directory.
#[derive(Debug, Clone)]
pub struct FileAuditStore {
    dir: PathBuf,
}

impl FileAuditStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AuditStoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids must name a plain file inside the store directory.
    fn path_for(&self, id: &str) -> Result<PathBuf, AuditStoreError> {
        let plain = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(['/', '\\', '\0'])
            && !id.contains("..");
        if !plain {
            return Err(AuditStoreError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

impl AuditStore for FileAuditStore {
    fn save(&self, trail: &AuditTrail) -> Result<(), AuditStoreError> {
        let path = self.path_for(&trail.id)?;
        let body = serde_json::to_vec_pretty(trail)?;
        // Write-then-rename keeps the previous snapshot readable on a crash.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<AuditTrail>, AuditStoreError> {
        let bytes = match fs::read(self.path_for(id)?) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| AuditStoreError::Corrupt {
                id: id.to_string(),
                source,
            })
    }

    fn clear(&self, id: &str) -> Result<(), AuditStoreError> {
        match fs::remove_file(self.path_for(id)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>, AuditStoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    trails: Mutex<HashMap<String, AuditTrail>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditStore for MemoryAuditStore {
    fn save(&self, trail: &AuditTrail) -> Result<(), AuditStoreError> {
        self.trails.lock().insert(trail.id.clone(), trail.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<AuditTrail>, AuditStoreError> {
        Ok(self.trails.lock().get(id).cloned())
    }

    fn clear(&self, id: &str) -> Result<(), AuditStoreError> {
        self.trails.lock().remove(id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, AuditStoreError> {
        let mut ids: Vec<String> = self.trails.lock().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::trail::{AuditEventType, AuditStatus};

    fn sample_trail() -> AuditTrail {
        let mut trail = AuditTrail::new("photo.jpg");
        trail.append(AuditEventType::FileIngest, "File received", AuditStatus::Success, None);
        trail
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(dir.path()).unwrap();
        let trail = sample_trail();

        store.save(&trail).unwrap();
        assert_eq!(store.list().unwrap(), vec![trail.id.clone()]);

        // A fresh handle on the same directory recovers the trail.
        let reopened = FileAuditStore::open(dir.path()).unwrap();
        assert_eq!(reopened.load(&trail.id).unwrap(), Some(trail.clone()));

        reopened.clear(&trail.id).unwrap();
        assert_eq!(reopened.load(&trail.id).unwrap(), None);
        assert!(reopened.list().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_clear_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(dir.path()).unwrap();
        assert!(store.clear("does-not-exist").is_ok());
    }

    #[test]
    fn test_file_store_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("broken.json"), b"{not json").unwrap();
        assert!(matches!(
            store.load("broken"),
            Err(AuditStoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_file_store_rejects_ids_outside_its_directory() {
        let root = tempfile::tempdir().unwrap();
        let store = FileAuditStore::open(root.path().join("audit")).unwrap();
        let victim = root.path().join("victim.json");
        fs::write(&victim, b"{}").unwrap();

        assert!(matches!(
            store.clear("../victim"),
            Err(AuditStoreError::InvalidId(_))
        ));
        assert!(victim.exists());
        assert!(matches!(
            store.load("../victim"),
            Err(AuditStoreError::InvalidId(_))
        ));

        let mut trail = sample_trail();
        trail.id = "../escaped".to_string();
        assert!(matches!(store.save(&trail), Err(AuditStoreError::InvalidId(_))));
        assert!(!root.path().join("escaped.json").exists());

        for id in ["", "..", "a/b", "a\\b", ".hidden"] {
            assert!(store.load(id).is_err(), "id {:?} accepted", id);
        }
    }

    #[test]
    fn test_memory_store_overwrites_snapshot() {
        let store = MemoryAuditStore::new();
        let mut trail = sample_trail();
        store.save(&trail).unwrap();

        trail.append(AuditEventType::LedgerCheck, "Lookup", AuditStatus::Pending, None);
        store.save(&trail).unwrap();

        assert_eq!(store.load(&trail.id).unwrap().unwrap().len(), 2);
        assert_eq!(store.list().unwrap().len(), 1);
    }
}
