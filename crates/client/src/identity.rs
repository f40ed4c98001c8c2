//! Stable per-installation device identity.
//!
//! The id is generated once as a timestamp+random composite and reused for
//! every later sign-in, so the approval flow can recognize the device. The
//! backing store is pluggable; the default is a JSON file under the platform
//! config directory.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration directory not found")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Minimal persistent key-value store backing the device identity.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredData {
    values: HashMap<String, String>,
}

/// JSON file store (default: `<config dir>/telecare/client.json`).
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir().ok_or(IdentityError::NoConfigDir)?;
        Self::with_path(config_dir.join("telecare").join("client.json"))
    }

    pub fn with_path(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    fn load(&self) -> Result<StoredData> {
        if !self.path.exists() {
            debug!("No existing client store at {:?}", self.path);
            return Ok(StoredData::default());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&contents) {
            Ok(data) => Ok(data),
            Err(e) => {
                warn!("Failed to parse client store, starting fresh: {}", e);
                Ok(StoredData::default())
            }
        }
    }

    fn save(&self, data: &StoredData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.load()?;
        data.values.insert(key.to_string(), value.to_string());
        self.save(&data)
    }
}

const DEVICE_ID_KEY: &str = "device_id";

/// Hands out the device id, creating and persisting one on first use.
pub struct DeviceIdentityProvider<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> DeviceIdentityProvider<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn get_or_create(&self) -> Result<String> {
        if let Some(id) = self.store.get(DEVICE_ID_KEY)? {
            if !id.is_empty() {
                return Ok(id);
            }
        }

        let id = generate_device_id();
        self.store.put(DEVICE_ID_KEY, &id)?;
        debug!("Generated new device id {}", id);
        Ok(id)
    }
}

/// Timestamp+random composite, e.g. `dev_1712000000000_k3qzt81xc`.
fn generate_device_id() -> String {
    use rand::distributions::Alphanumeric;

    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();

    format!(
        "dev_{}_{}",
        Utc::now().timestamp_millis(),
        suffix.to_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_device_id_format() {
        let id = generate_device_id();
        assert!(id.starts_with("dev_"));
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let dir = tempdir().unwrap();
        let store = FileStore::with_path(dir.path().join("client.json")).unwrap();
        let provider = DeviceIdentityProvider::new(store);

        let first = provider.get_or_create().unwrap();
        let second = provider.get_or_create().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_identity_survives_new_provider() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client.json");

        let first = {
            let store = FileStore::with_path(path.clone()).unwrap();
            DeviceIdentityProvider::new(store).get_or_create().unwrap()
        };

        let store = FileStore::with_path(path).unwrap();
        let second = DeviceIdentityProvider::new(store).get_or_create().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_corrupt_store_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::with_path(path).unwrap();
        let provider = DeviceIdentityProvider::new(store);
        let id = provider.get_or_create().unwrap();
        assert!(id.starts_with("dev_"));
    }
}
