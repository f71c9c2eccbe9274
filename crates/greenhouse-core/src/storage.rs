//! Persistent key/value register abstraction.
//!
//! The device keeps its settings in a flat key/value namespace, the shape
//! offered by flash-backed stores such as ESP-IDF NVS. Implementations:
//! - [`MemoryStorage`]: volatile, for tests and bring-up
//! - [`JsonFileStorage`]: a single JSON object file for hosted targets
//!
//! All methods are synchronous and bounded so they can be called from the
//! cooperative control loop.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A single persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl ConfigValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::Text(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Int(value)
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        ConfigValue::Int(i64::from(value))
    }
}

impl From<u16> for ConfigValue {
    fn from(value: u16) -> Self {
        ConfigValue::Int(i64::from(value))
    }
}

impl From<u8> for ConfigValue {
    fn from(value: u8) -> Self {
        ConfigValue::Int(i64::from(value))
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Int(i64::from(value))
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Text(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Text(value)
    }
}

/// Errors reported by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to read from the backing store.
    #[error("Read error: {0}")]
    Read(String),
    /// Failed to write to the backing store.
    #[error("Write error: {0}")]
    Write(String),
    /// Stored data could not be decoded.
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Storage is not available.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Flat key/value persistence consumed by the config store.
pub trait KeyValueStorage {
    /// Load a value by key. `Ok(None)` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<ConfigValue>, StorageError>;

    /// Persist a value. Once this returns `Ok` the value is durable.
    fn put(&mut self, key: &str, value: &ConfigValue) -> Result<(), StorageError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;

    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

impl<S: KeyValueStorage + ?Sized> KeyValueStorage for Box<S> {
    fn get(&self, key: &str) -> Result<Option<ConfigValue>, StorageError> {
        (**self).get(key)
    }

    fn put(&mut self, key: &str, value: &ConfigValue) -> Result<(), StorageError> {
        (**self).put(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}

/// Volatile in-memory storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: BTreeMap<String, ConfigValue>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key, as if it had been persisted earlier.
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<ConfigValue>, StorageError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &ConfigValue) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.data.keys().cloned().collect())
    }
}

/// File-backed storage holding the whole register as one JSON object.
///
/// Every `put`/`remove` rewrites the file through a temporary sibling and a
/// rename, so a crash never leaves a truncated register behind.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    data: BTreeMap<String, ConfigValue>,
}

impl JsonFileStorage {
    /// Open (or lazily create) the register at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| StorageError::InvalidData(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StorageError::Read(format!("{}: {e}", path.display()))),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| StorageError::Write(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| StorageError::Write(format!("{}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| StorageError::Write(format!("{}: {e}", self.path.display())))
    }
}

impl KeyValueStorage for JsonFileStorage {
    fn get(&self, key: &str) -> Result<Option<ConfigValue>, StorageError> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &ConfigValue) -> Result<(), StorageError> {
        let previous = self.data.insert(key.to_string(), value.clone());
        if let Err(e) = self.flush() {
            // Keep the cache in step with what is actually on disk.
            match previous {
                Some(old) => self.data.insert(key.to_string(), old),
                None => self.data.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        if let Some(old) = self.data.remove(key) {
            if let Err(e) = self.flush() {
                self.data.insert(key.to_string(), old);
                return Err(e);
            }
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.data.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "greenhouse-core-{}-{}.json",
            name,
            std::process::id()
        ))
    }

    #[test]
    fn test_config_value_json_shape() {
        assert_eq!(serde_json::to_string(&ConfigValue::Int(1883)).unwrap(), "1883");
        assert_eq!(serde_json::to_string(&ConfigValue::Bool(true)).unwrap(), "true");
        assert_eq!(
            serde_json::to_string(&ConfigValue::from("tower")).unwrap(),
            "\"tower\""
        );
        let parsed: ConfigValue = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, ConfigValue::Int(42));
    }

    #[test]
    fn test_config_value_accessors() {
        assert_eq!(ConfigValue::Int(5).as_int(), Some(5));
        assert_eq!(ConfigValue::Int(5).as_str(), None);
        assert_eq!(ConfigValue::from("x").as_str(), Some("x"));
        assert_eq!(ConfigValue::Bool(false).as_bool(), Some(false));
    }

    #[test]
    fn test_memory_storage() {
        let mut storage = MemoryStorage::new().with("mqtt_port", 1883u16);
        assert_eq!(storage.get("mqtt_port").unwrap(), Some(ConfigValue::Int(1883)));
        assert_eq!(storage.get("missing").unwrap(), None);

        storage.put("hostname", &ConfigValue::from("tower")).unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["hostname", "mqtt_port"]);

        storage.remove("hostname").unwrap();
        storage.remove("hostname").unwrap();
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_json_file_storage_persists_across_reopen() {
        let path = temp_path("reopen");
        let _ = std::fs::remove_file(&path);

        {
            let mut storage = JsonFileStorage::open(&path).unwrap();
            storage.put("hostname", &ConfigValue::from("tower")).unwrap();
            storage.put("mqtt_port", &ConfigValue::Int(8883)).unwrap();
            storage.put("mqtt_broker_discovery", &ConfigValue::Bool(false)).unwrap();
            storage.remove("mqtt_port").unwrap();
        }

        let storage = JsonFileStorage::open(&path).unwrap();
        assert_eq!(storage.get("hostname").unwrap(), Some(ConfigValue::from("tower")));
        assert_eq!(storage.get("mqtt_port").unwrap(), None);
        assert_eq!(
            storage.get("mqtt_broker_discovery").unwrap(),
            Some(ConfigValue::Bool(false))
        );

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_json_file_storage_rejects_garbage() {
        let path = temp_path("garbage");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonFileStorage::open(&path),
            Err(StorageError::InvalidData(_))
        ));
        std::fs::remove_file(&path).unwrap();
    }
}
