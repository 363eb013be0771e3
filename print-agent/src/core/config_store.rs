//! Persisted key/value configuration store
//!
//! An opaque CRUD-by-string-key store backed by one JSON file in the
//! data directory. Holds whatever the pairing flow saved: tenant id,
//! client id, API key, token, user object, heartbeat interval,
//! environment selector, auto-register flag. Writes are atomic
//! (tmp-then-rename), same discipline as the queue file.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

/// Data directory resolution: `RMP_DATA_DIR` env, then the user home,
/// then the temp dir as a last resort.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RMP_DATA_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return PathBuf::from(home).join(".repairmind-print");
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        if !profile.is_empty() {
            return PathBuf::from(profile).join(".repairmind-print");
        }
    }
    std::env::temp_dir().join("repairmind-print-data")
}

#[derive(Debug)]
pub struct ConfigStore {
    dir: PathBuf,
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl ConfigStore {
    /// Open the store in `dir`, creating the directory if needed.
    /// A missing or corrupt file starts the store empty.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("config.json");

        let values = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Map<String, Value>>(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Corrupt config store, starting empty: {e}");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        Ok(Self {
            dir,
            path,
            values: Mutex::new(values),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> std::io::Result<()> {
        {
            let mut values = self.values.lock().unwrap();
            values.insert(key.into(), value);
        }
        self.persist()
    }

    pub fn remove(&self, key: &str) -> std::io::Result<()> {
        let removed = {
            let mut values = self.values.lock().unwrap();
            values.remove(key).is_some()
        };
        if removed {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> std::io::Result<()> {
        let bytes = {
            let values = self.values.lock().unwrap();
            serde_json::to_vec_pretty(&*values)?
        };

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, &bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();

        store.set("tenant_id", Value::String("t-42".into())).unwrap();
        store.set("heartbeat_interval", Value::from(45)).unwrap();

        assert_eq!(store.get_string("tenant_id").as_deref(), Some("t-42"));
        assert_eq!(store.get_string("heartbeat_interval").as_deref(), Some("45"));
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = ConfigStore::open(dir.path()).unwrap();
            store
                .set("client_id", Value::String("c-1".into()))
                .unwrap();
        }
        let store = ConfigStore::open(dir.path()).unwrap();
        assert_eq!(store.get_string("client_id").as_deref(), Some("c-1"));
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();
        store.set("token", Value::String("x".into())).unwrap();
        store.remove("token").unwrap();
        assert!(store.get("token").is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), b"{ nope").unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();
        assert!(store.get("anything").is_none());
    }
}
