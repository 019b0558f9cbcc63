//! Session storage
//!
//! String key/value storage standing in for the browser's `localStorage`.
//! The session uses three keys: [`TOKEN_KEY`], [`USER_KEY`] and [`CART_KEY`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use crate::{Result, StorefrontError};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const CART_KEY: &str = "cartItems";

/// Tokens of this length or shorter are treated as missing.
pub const MIN_TOKEN_LEN: usize = 20;

pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

pub fn load_json<T: DeserializeOwned>(storage: &dyn SessionStorage, key: &str) -> Result<Option<T>> {
    match storage.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize>(storage: &dyn SessionStorage, key: &str, value: &T) -> Result<()> {
    storage.set(key, &serde_json::to_string(value)?)
}

pub fn has_valid_token(storage: &dyn SessionStorage) -> bool {
    matches!(storage.get(TOKEN_KEY), Ok(Some(token)) if token.len() > MIN_TOKEN_LEN)
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self { Self::default() }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }
}

/// All keys in one JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path { &self.path }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorefrontError::Storage(format!("read {}: {}", self.path.display(), e))),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorefrontError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(entries)?)
            .map_err(|e| StorefrontError::Storage(format!("write {}: {}", self.path.display(), e)))
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.read_all()?;
        f(&mut entries);
        self.write_all(&entries)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| { entries.insert(key.to_string(), value.to_string()); })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| { entries.remove(key); })
    }
}
