use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{FomoError, Result};
use crate::fomo::codec::ObfuscationCodec;

/// The minimal durable key-value capability the engine needs.
///
/// Methods take `&self`: the real medium (`localStorage`) is shared by every
/// tab of the origin, so implementations hold their state behind interior
/// mutability.
pub trait KeyValueMedium {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

/// In-process medium. Used when browser storage is unavailable (private
/// mode, disabled cookies) and as the shared "origin storage" in tests.
#[derive(Default)]
pub struct MemoryMedium {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueMedium for MemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

/// Where a loaded value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Encrypted,
    /// Untagged plaintext written by an older version of the site.
    Legacy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub value: T,
    pub provenance: Provenance,
}

/// Typed key-value store that writes every value as an obfuscated blob.
///
/// Reads never fail: anything missing, unreadable or undecodable comes back
/// as `None`. Writes report errors so callers can log them, but nothing in
/// the engine treats a failed write as fatal.
#[derive(Clone)]
pub struct ObfuscatedStore {
    medium: Rc<dyn KeyValueMedium>,
    codec: Rc<ObfuscationCodec>,
}

impl ObfuscatedStore {
    pub fn new(medium: Rc<dyn KeyValueMedium>, codec: Rc<ObfuscationCodec>) -> Self {
        Self { medium, codec }
    }

    /// Whether anything, readable or not, is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.medium.get(key), Ok(Some(_)))
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<Loaded<T>> {
        let raw = match self.medium.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Reading {} failed: {}", key, e);
                return None;
            }
        };

        if ObfuscationCodec::is_tagged(&raw) {
            return self.codec.decode_soft(&raw).map(|value| Loaded {
                value,
                provenance: Provenance::Encrypted,
            });
        }

        match serde_json::from_str(&raw) {
            Ok(value) => Some(Loaded {
                value,
                provenance: Provenance::Legacy,
            }),
            Err(e) => {
                log::debug!("Ignoring unparseable legacy value under {}: {}", key, e);
                None
            }
        }
    }

    /// Reads `key`, migrating legacy plaintext to the tagged form on the way.
    pub fn get<T: Serialize + DeserializeOwned>(&self, key: &str) -> Option<T> {
        let loaded = self.load::<T>(key)?;
        if loaded.provenance == Provenance::Legacy {
            if let Err(e) = self.set(key, &loaded.value) {
                log::warn!("Migrating legacy {} failed: {}", key, e);
            } else {
                log::info!("Migrated legacy plaintext under {}", key);
            }
        }
        Some(loaded.value)
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let blob = self.codec.encode(value)?;
        self.medium.set(key, &blob).map_err(|e| match e {
            FomoError::StorageWrite { .. } => e,
            other => FomoError::StorageWrite {
                key: key.to_string(),
                reason: other.to_string(),
            },
        })
    }

    #[cfg(test)]
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.medium.remove(key) {
            log::warn!("Removing {} failed: {}", key, e);
        }
    }
}
