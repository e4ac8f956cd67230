use crate::config::{ConfigStore, KEYPAIR_PATH_KEY};
use anyhow::{bail, Context, Result};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const DEFAULT_KEYPAIR_PATH: &str = "./keypair.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keypair {
    pub address: String,
    #[serde(rename = "privateKey")]
    pub private_key: String,
}

/// Generate a fresh random keypair. The address is the hex of the last 20
/// bytes of the SHA-256 of the public key.
pub fn generate() -> Keypair {
    let mut csprng = OsRng;
    let signing_key: SigningKey = SigningKey::generate(&mut csprng);
    let verifying_key = signing_key.verifying_key();

    Keypair {
        address: derive_address(&verifying_key.to_bytes()),
        private_key: format!("0x{}", hex::encode(signing_key.to_bytes())),
    }
}

fn derive_address(public_key_bytes: &[u8; 32]) -> String {
    let digest = Sha256::digest(public_key_bytes);
    format!("0x{}", hex::encode(&digest[digest.len() - 20..]))
}

/// Generate and persist a keypair, recording its path in the config store.
/// Refuses to overwrite an existing file unless `overwrite` is set.
pub fn create_keypair(store: &ConfigStore, output: &Path, overwrite: bool) -> Result<Keypair> {
    if output.exists() && !overwrite {
        bail!(
            "keypair file already exists at {} (pass --overwrite to replace it)",
            output.display()
        );
    }

    let keypair = generate();
    let content = serde_json::to_string_pretty(&keypair)?;
    fs::write(output, content)
        .with_context(|| format!("Failed to write keypair file {}", output.display()))?;

    store.set(KEYPAIR_PATH_KEY, json!(output.to_string_lossy()))?;
    Ok(keypair)
}

/// Load the keypair the config store points at, validating that it carries
/// a private key.
pub fn read_keypair(store: &ConfigStore) -> Result<Keypair> {
    let path = store
        .get_str(KEYPAIR_PATH_KEY)?
        .unwrap_or_else(|| DEFAULT_KEYPAIR_PATH.to_string());

    let content = fs::read_to_string(&path).with_context(|| {
        format!(
            "Failed to read keypair file {} (run `genlayer keygen create` first)",
            path
        )
    })?;

    let keypair: Keypair = serde_json::from_str(&content)
        .with_context(|| format!("Keypair file {} is not valid JSON", path))?;

    if keypair.private_key.trim().is_empty() {
        bail!("keypair file {} has no private key", path);
    }

    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_shape() {
        let keypair = generate();
        assert!(keypair.address.starts_with("0x"));
        assert_eq!(keypair.address.len(), 42);
        assert!(keypair.private_key.starts_with("0x"));
        assert_eq!(keypair.private_key.len(), 66);
    }

    #[test]
    fn test_generate_is_random() {
        let a = generate();
        let b = generate();
        assert_ne!(a.address, b.address);
        assert_ne!(a.private_key, b.private_key);
    }

    #[test]
    fn test_create_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::open_in(dir.path()).unwrap();
        let path = dir.path().join("keypair.json");

        let first = create_keypair(&store, &path, false).unwrap();
        let err = create_keypair(&store, &path, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        // The original pair is untouched.
        let on_disk: Keypair =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.address, first.address);
    }

    #[test]
    fn test_create_with_overwrite_replaces_and_tracks_path() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::open_in(dir.path()).unwrap();
        let path = dir.path().join("keypair.json");

        let first = create_keypair(&store, &path, false).unwrap();
        let second = create_keypair(&store, &path, true).unwrap();
        assert_ne!(first.address, second.address);

        assert_eq!(
            store.get_str(KEYPAIR_PATH_KEY).unwrap().unwrap(),
            path.to_string_lossy()
        );

        let loaded = read_keypair(&store).unwrap();
        assert_eq!(loaded.address, second.address);
        assert_eq!(loaded.private_key, second.private_key);
    }

    #[test]
    fn test_read_rejects_missing_private_key() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::open_in(dir.path()).unwrap();
        let path = dir.path().join("keypair.json");

        fs::write(&path, r#"{"address": "0xabc", "privateKey": ""}"#).unwrap();
        store
            .set(KEYPAIR_PATH_KEY, serde_json::json!(path.to_string_lossy()))
            .unwrap();

        assert!(read_keypair(&store).is_err());
    }
}
