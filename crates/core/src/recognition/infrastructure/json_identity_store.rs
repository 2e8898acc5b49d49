use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::recognition::domain::identity_store::{IdentityKey, IdentityStore, IdentityTable};
use crate::shared::atomic_file::write_atomically;

#[derive(Error, Debug)]
pub enum IdentityStoreError {
    #[error("failed to read identity store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write identity store {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt identity store {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Identity table persisted as a JSON file, rewritten atomically whenever a
/// new identity is created.
#[derive(Debug)]
pub struct JsonIdentityStore {
    path: PathBuf,
    table: IdentityTable,
}

impl JsonIdentityStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, IdentityStoreError> {
        let table = if path.exists() {
            let bytes = fs::read(path).map_err(|source| IdentityStoreError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let corrupt = |reason: String| IdentityStoreError::Corrupt {
                path: path.to_path_buf(),
                reason,
            };
            let table: IdentityTable = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
            table.validate().map_err(corrupt)?;
            log::debug!("Loaded {} identities from {}", table.len(), path.display());
            table
        } else {
            IdentityTable::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            table,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), IdentityStoreError> {
        let write_err = |source: std::io::Error| IdentityStoreError::Write {
            path: self.path.clone(),
            source,
        };
        let bytes = serde_json::to_vec_pretty(&self.table).map_err(|e| write_err(e.into()))?;
        write_atomically(&self.path, &bytes).map_err(write_err)
    }
}

impl IdentityStore for JsonIdentityStore {
    fn resolve_or_create(&mut self, hint: &str) -> Result<IdentityKey, Box<dyn std::error::Error>> {
        let before = self.table.clone();
        let (key, created) = self.table.resolve_or_insert(hint);
        if created {
            if let Err(e) = self.persist() {
                // Memory must not hold a key the file never recorded.
                self.table = before;
                return Err(e.into());
            }
            log::info!("Created identity {key} for {hint:?}");
        }
        Ok(key)
    }

    fn lookup(&self, key: IdentityKey) -> Result<Option<String>, Box<dyn std::error::Error>> {
        Ok(self.table.name_of(key).map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identities_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");

        let mut store = JsonIdentityStore::open(&path).unwrap();
        let alice = store.resolve_or_create("alice").unwrap();
        let bob = store.resolve_or_create("bob").unwrap();
        assert_ne!(alice, bob);
        drop(store);

        let mut reopened = JsonIdentityStore::open(&path).unwrap();
        assert_eq!(reopened.lookup(alice).unwrap().as_deref(), Some("alice"));
        assert_eq!(reopened.resolve_or_create("bob").unwrap(), bob);
        assert_eq!(reopened.resolve_or_create("carol").unwrap(), IdentityKey(3));
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonIdentityStore::open(&dir.path().join("none.json")).unwrap();
        assert_eq!(store.lookup(IdentityKey(1)).unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.json");
        fs::write(&path, b"[1, 2").unwrap();
        assert!(matches!(
            JsonIdentityStore::open(&path),
            Err(IdentityStoreError::Corrupt { .. })
        ));
    }
}
