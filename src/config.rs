use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".genlayer";
pub const CONFIG_FILE: &str = "genlayer-config.json";

pub const KEYPAIR_PATH_KEY: &str = "keyPairPath";
pub const NETWORK_KEY: &str = "network";
pub const DEFAULT_OLLAMA_MODEL_KEY: &str = "defaultOllamaModel";
pub const SIMULATOR_LOCATION_KEY: &str = "simulatorLocation";

/// Flat key-value JSON store at `~/.genlayer/genlayer-config.json`.
///
/// Every write round-trips through a full-file read-modify-write; the file
/// always contains a valid JSON object. Absent keys read as `None`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().context("Cannot determine home directory")?;
        Self::open_in(&home)
    }

    /// Open (and initialize if needed) the store under the given base
    /// directory. Idempotent.
    pub fn open_in(base: &Path) -> Result<Self> {
        let dir = base.join(CONFIG_DIR);
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            fs::write(&path, "{}")
                .with_context(|| format!("Failed to initialize config file {}", path.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_all(&self) -> Result<Map<String, Value>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config file {}", self.path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Config file {} is not valid JSON", self.path.display()))?;
        match value {
            Value::Object(map) => Ok(map),
            _ => anyhow::bail!(
                "Config file {} does not contain a JSON object",
                self.path.display()
            ),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get_all()?.get(key).cloned())
    }

    /// Read a key as a string, treating non-string values as absent.
    pub fn get_str(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self.get_all()?;
        map.insert(key.to_string(), value);
        self.write_all(&map)
    }

    /// Remove a key. Returns whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let mut map = self.get_all()?;
        let existed = map.remove(key).is_some();
        if existed {
            self.write_all(&map)?;
        }
        Ok(existed)
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<()> {
        let content = serde_json::to_string_pretty(&Value::Object(map.clone()))?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write config file {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_open_initializes_empty_object() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::open_in(dir.path()).unwrap();
        assert!(store.path().exists());
        assert!(store.get_all().unwrap().is_empty());

        // Reopening must not clobber existing content.
        store.set("network", json!("localnet")).unwrap();
        let reopened = ConfigStore::open_in(dir.path()).unwrap();
        assert_eq!(reopened.get("network").unwrap(), Some(json!("localnet")));
    }

    #[test]
    fn test_set_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::open_in(dir.path()).unwrap();

        store.set("keyPairPath", json!("./keypair.json")).unwrap();
        store.set("count", json!(42)).unwrap();

        assert_eq!(
            store.get("keyPairPath").unwrap(),
            Some(json!("./keypair.json"))
        );
        assert_eq!(store.get("count").unwrap(), Some(json!(42)));
        assert_eq!(
            store.get_str("keyPairPath").unwrap().as_deref(),
            Some("./keypair.json")
        );
    }

    #[test]
    fn test_absent_key_reads_as_none() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::open_in(dir.path()).unwrap();
        assert_eq!(store.get("missing").unwrap(), None);
        assert_eq!(store.get_str("missing").unwrap(), None);
    }

    #[test]
    fn test_remove_existing_and_absent() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::open_in(dir.path()).unwrap();

        store.set("defaultOllamaModel", json!("llama3")).unwrap();
        assert!(store.remove("defaultOllamaModel").unwrap());
        assert_eq!(store.get("defaultOllamaModel").unwrap(), None);

        // Removing an absent key is a no-op with a distinct outcome.
        assert!(!store.remove("defaultOllamaModel").unwrap());
    }

    #[test]
    fn test_overwrite_existing_key() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::open_in(dir.path()).unwrap();

        store.set("network", json!("localnet")).unwrap();
        store.set("network", json!("studionet")).unwrap();
        assert_eq!(store.get("network").unwrap(), Some(json!("studionet")));
    }
}
