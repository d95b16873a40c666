//! Durable key-value storage behind the vault.
//!
//! The vault only ever talks to storage through [`KeyValueStore`], so the
//! backing medium (files on a phone, an in-memory map in tests) is swappable.
//! All methods take `&self`; implementations provide their own interior
//! mutability where needed.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::VaultError;

/// Abstract synchronous key-value store.
///
/// Keys are opaque strings (typically obfuscated names, see
/// [`crate::obfuscate`]); values are opaque byte blobs. Failures surface as
/// [`VaultError::Storage`] without further classification.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`. Returns `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, VaultError>;

    /// Write `value` under `key`, overwriting any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), VaultError>;

    /// Remove the value under `key`. No-op if absent.
    fn delete(&self, key: &str) -> Result<(), VaultError>;

    /// Remove every stored entry.
    fn clear_all(&self) -> Result<(), VaultError>;

    /// Check whether a value exists under `key`.
    ///
    /// Default implementation delegates to [`get`](Self::get).
    fn contains(&self, key: &str) -> Result<bool, VaultError> {
        Ok(self.get(key)?.is_some())
    }
}

/// In-memory store for tests and for degraded-persistence fallbacks.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, VaultError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), VaultError> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), VaultError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), VaultError> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// File-backed store: one file per key inside a single directory.
///
/// Writes are atomic: the value is written to a temp file, synced, then
/// renamed over the destination, so a crash mid-write never leaves a
/// truncated value visible.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, VaultError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(storage_err)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(escape_key(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, VaultError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), VaultError> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.tmp", escape_key(key)));
        let mut file = fs::File::create(&tmp).map_err(storage_err)?;
        file.write_all(value).map_err(storage_err)?;
        file.sync_all().map_err(storage_err)?;
        drop(file);
        fs::rename(&tmp, &path).map_err(storage_err)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), VaultError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(e)),
        }
    }

    fn clear_all(&self) -> Result<(), VaultError> {
        for entry in fs::read_dir(&self.dir).map_err(storage_err)? {
            let entry = entry.map_err(storage_err)?;
            if entry.file_type().map_err(storage_err)?.is_file() {
                fs::remove_file(entry.path()).map_err(storage_err)?;
            }
        }
        Ok(())
    }
}

fn storage_err(e: std::io::Error) -> VaultError {
    VaultError::Storage(e.to_string())
}

/// Escape a storage key into a filesystem-safe file name.
///
/// Obfuscated keys are already plain hex, but legacy keys can contain
/// arbitrary account identifiers. Bytes outside `[A-Za-z0-9._-]` are encoded
/// as `%XX`.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                out.push(b as char);
            }
            _ => out.push_str(&format!("%{b:02x}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set("k", b"value").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn memory_store_overwrite() {
        let store = MemoryStore::new();
        store.set("k", b"one").unwrap();
        store.set("k", b"two").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn memory_store_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("k", b"v").unwrap();
        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn memory_store_clear_all() {
        let store = MemoryStore::new();
        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();
        store.clear_all().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn contains_default_impl() {
        let store = MemoryStore::new();
        assert!(!store.contains("k").unwrap());
        store.set("k", b"v").unwrap();
        assert!(store.contains("k").unwrap());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("obf_abc123", b"ciphertext").unwrap();
        assert_eq!(store.get("obf_abc123").unwrap(), Some(b"ciphertext".to_vec()));
    }

    #[test]
    fn file_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("nope").unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.set("k", b"persisted").unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"persisted".to_vec()));
    }

    #[test]
    fn file_store_clear_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();
        store.clear_all().unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn file_store_escapes_hostile_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("../escape/attempt", b"v").unwrap();
        assert_eq!(store.get("../escape/attempt").unwrap(), Some(b"v".to_vec()));
        // Nothing must have been written outside the store directory.
        assert!(!dir.path().parent().unwrap().join("escape").exists());
    }

    #[test]
    fn escape_key_passes_plain_names() {
        assert_eq!(escape_key("obf_0a1b2c"), "obf_0a1b2c");
        assert_eq!(escape_key("veil.device_salt"), "veil.device_salt");
    }

    #[test]
    fn escape_key_encodes_separator() {
        assert_eq!(escape_key("a/b"), "a%2fb");
    }
}
