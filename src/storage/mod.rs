use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Result, SessionError};
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub mod file;
pub mod keyring_store;

pub use file::FileStore;
pub use keyring_store::KeyringStore;

/// Durable string key-value storage, the moral equivalent of `localStorage`.
///
/// Values are opaque strings; the token store decides how to encode them.
/// Implementations must be usable from several tasks at once.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store. Nothing survives the process; used by tests and by
/// hosts that manage persistence themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every entry, for assertions.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| SessionError::Storage("memory store lock poisoned".into()).into())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Opens the backend selected in configuration.
///
/// The file backend defaults to `session.json` in the platform data
/// directory (overridable with `storage.path`).
pub fn open_backend(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Keyring => Arc::new(KeyringStore::new(&config.namespace)),
        StorageBackend::File => {
            let path = match &config.path {
                Some(p) => PathBuf::from(p),
                None => default_session_path()?,
            };
            Arc::new(FileStore::new(path)?)
        }
    };
    tracing::debug!(backend = ?config.backend, "Opened session storage backend");
    Ok(store)
}

fn default_session_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "refract", "oidc-session")
        .ok_or_else(|| SessionError::Storage("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().join("session.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_store_remove_absent_is_ok() {
        let store = MemoryStore::new();
        assert!(store.remove("never-set").is_ok());
    }

    #[test]
    fn test_memory_store_snapshot() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        let snap = store.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap["a"], "1");
    }

    #[test]
    fn test_open_backend_file_uses_configured_path() {
        let dir = tempdir().expect("failed to create tempdir");
        let path = dir.path().join("nested").join("session.json");
        let config = StorageConfig {
            backend: StorageBackend::File,
            namespace: "refract".to_string(),
            path: Some(path.to_string_lossy().to_string()),
        };

        let store = open_backend(&config).expect("open file backend");
        store.set("x", "y").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_open_backend_memory() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            namespace: "refract".to_string(),
            path: None,
        };
        let store = open_backend(&config).expect("open memory backend");
        store.set("x", "y").unwrap();
        assert_eq!(store.get("x").unwrap().as_deref(), Some("y"));
    }
}
