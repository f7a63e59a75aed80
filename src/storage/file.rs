//! Single-file JSON backend
//!
//! All keys live in one JSON object. Every write rewrites the whole file
//! through a sibling temp file and a rename, so a crash never leaves a
//! half-written document behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

use crate::error::{Result, SessionError};
use crate::storage::KeyValueStore;

/// Key-value store persisted as a JSON object file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileStore {
    /// Opens (without reading) the store at `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create storage directory {}", parent.display())
                })?;
            }
        }
        Ok(Self {
            path,
            guard: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_contents(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(contents))
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        let Some(contents) = self.read_contents()? else {
            return Ok(BTreeMap::new());
        };
        let map = serde_json::from_str(&contents).map_err(|e| {
            SessionError::Storage(format!(
                "{} is not a JSON object of strings: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(map)
    }

    fn write_all(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _lock = self
            .guard
            .lock()
            .map_err(|_| SessionError::Storage("file store lock poisoned".into()))?;
        let mut map: BTreeMap<String, String> = match self.read_contents()? {
            None => BTreeMap::new(),
            Some(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                // The write replaces the corrupt document.
                let corruption = SessionError::StorageCorruption {
                    key: self.path.display().to_string(),
                    reason: e.to_string(),
                };
                tracing::warn!("{}; starting from an empty session file", corruption);
                BTreeMap::new()
            }),
        };
        f(&mut map);
        self.write_all(&map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _lock = self
            .guard
            .lock()
            .map_err(|_| SessionError::Storage("file store lock poisoned".into()))?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.modify(|map| {
            map.remove(key);
        })
    }
}
