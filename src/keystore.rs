//! Local storage for key pairs generated by onboarding.
//!
//! Maps wallet address to secret key hex. The file is plain JSON; protecting
//! it is left to the filesystem.

use crate::crypto::KeyPair;
use crate::error::{LedgerError, Result};
use crate::persistence::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeystoreFile {
    keys: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct Keystore {
    path: PathBuf,
    keys: BTreeMap<String, String>,
}

impl Keystore {
    /// Opens the keystore at `path`; a missing file is an empty keystore.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Keystore {
                path,
                keys: BTreeMap::new(),
            });
        }
        let contents = fs::read_to_string(&path)
            .map_err(|e| LedgerError::Io(format!("failed to read {}: {}", path.display(), e)))?;
        let file: KeystoreFile = serde_json::from_str(&contents).map_err(|e| {
            LedgerError::Serialization(format!("failed to parse keystore {}: {}", path.display(), e))
        })?;
        Ok(Keystore {
            path,
            keys: file.keys,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<()> {
        let file = KeystoreFile {
            keys: self.keys.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.path, json.as_bytes())
    }

    pub fn insert(&mut self, address: &str, key: &KeyPair) {
        self.keys.insert(address.to_string(), key.secret_hex());
    }

    pub fn key_for(&self, address: &str) -> Result<Option<KeyPair>> {
        self.keys
            .get(address)
            .map(|secret| KeyPair::from_secret_hex(secret))
            .transpose()
    }

    /// Like [`Keystore::key_for`], but a missing key is an
    /// `UnauthorizedSigner` error naming the wallet.
    pub fn require(&self, address: &str) -> Result<KeyPair> {
        self.key_for(address)?.ok_or_else(|| {
            LedgerError::UnauthorizedSigner(format!(
                "no key for {} in {}",
                address,
                self.path.display()
            ))
        })
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
