//! Obfuscated storage key names.
//!
//! Raw storage key names would reveal which accounts exist on the device.
//! The obfuscator derives unpredictable but stable names from a per-device
//! random salt, so inspecting the underlying store shows only entries like
//! `obf_3fa9c0…` with no account identifiers.
//!
//! The device salt is obfuscation input only; it is never used as key
//! material for secrets (that is the cipher's Argon2id salt, per blob).

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::VaultError;
use crate::store::KeyValueStore;

/// Fixed storage name for the per-device obfuscation salt.
pub const DEVICE_SALT_KEY: &str = "veil.device_salt";

/// Fixed storage name for the legacy-key recovery map (plaintext JSON).
pub const RECOVERY_MAP_KEY: &str = "veil.key_recovery_map";

/// Device salt length in bytes.
pub const DEVICE_SALT_LEN: usize = 32;

/// Number of digest bytes kept in an obfuscated name.
const OBFUSCATED_HASH_LEN: usize = 16;

/// Prefix on every obfuscated storage key.
const OBFUSCATED_PREFIX: &str = "obf_";

/// Derives stable, unpredictable storage key names from a device salt.
///
/// Constructed once per vault; the salt is loaded (or created and persisted)
/// at construction time. If the salt cannot be persisted, the obfuscator
/// falls back to an in-memory salt: key names stay consistent for the rest
/// of the process but will differ after a restart.
pub struct KeyObfuscator {
    salt: [u8; DEVICE_SALT_LEN],
    persisted: bool,
}

impl KeyObfuscator {
    /// Load the device salt from the store, creating and persisting it on
    /// first use.
    ///
    /// Never fails: storage trouble degrades to an in-memory salt with a
    /// warning rather than blocking the vault.
    pub fn load_or_create(store: &dyn KeyValueStore) -> Self {
        match store.get(DEVICE_SALT_KEY) {
            Ok(Some(bytes)) if bytes.len() == DEVICE_SALT_LEN => {
                let mut salt = [0u8; DEVICE_SALT_LEN];
                salt.copy_from_slice(&bytes);
                return Self {
                    salt,
                    persisted: true,
                };
            }
            Ok(Some(bytes)) => {
                warn!(
                    len = bytes.len(),
                    "stored device salt has wrong length, regenerating"
                );
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "could not read device salt, using in-memory salt");
                return Self::in_memory();
            }
        }

        use rand::RngCore;
        let mut salt = [0u8; DEVICE_SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let persisted = match store.set(DEVICE_SALT_KEY, &salt) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "could not persist device salt, key names will not survive restart");
                false
            }
        };
        Self { salt, persisted }
    }

    fn in_memory() -> Self {
        use rand::RngCore;
        let mut salt = [0u8; DEVICE_SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        Self {
            salt,
            persisted: false,
        }
    }

    /// Whether the device salt survived to durable storage.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Derive the obfuscated storage name for `(original_key, key_type)`.
    ///
    /// Deterministic for a given device salt; distinct pairs produce distinct
    /// names except with negligible probability (16-byte truncation, dozens
    /// to low hundreds of keys).
    pub fn obfuscate(&self, original_key: &str, key_type: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt);
        hasher.update(original_key.as_bytes());
        hasher.update(key_type.as_bytes());
        let digest = hasher.finalize();
        format!(
            "{OBFUSCATED_PREFIX}{}",
            hex::encode(&digest[..OBFUSCATED_HASH_LEN])
        )
    }

    /// Move a value stored under a legacy plain key to its obfuscated key.
    ///
    /// Records the `original -> obfuscated` pair in the plaintext recovery
    /// map, then deletes the legacy entry. Returns the obfuscated key, or
    /// `None` when there was nothing to migrate. Idempotent: after a
    /// successful migration the legacy entry is gone, so repeat calls are
    /// no-ops.
    pub fn migrate(
        &self,
        store: &dyn KeyValueStore,
        original_key: &str,
        key_type: &str,
    ) -> Result<Option<String>, VaultError> {
        let Some(value) = store.get(original_key)? else {
            return Ok(None);
        };

        let obfuscated = self.obfuscate(original_key, key_type);
        store.set(&obfuscated, &value)?;

        // Recovery map is best-effort debugging metadata; a write failure
        // must not abort the migration itself.
        if let Err(e) = self.record_mapping(store, original_key, &obfuscated) {
            warn!(error = %e, original_key, "could not update key recovery map");
        }

        store.delete(original_key)?;
        Ok(Some(obfuscated))
    }

    fn record_mapping(
        &self,
        store: &dyn KeyValueStore,
        original_key: &str,
        obfuscated: &str,
    ) -> Result<(), VaultError> {
        let mut map: std::collections::BTreeMap<String, String> =
            match store.get(RECOVERY_MAP_KEY)? {
                Some(bytes) => serde_json::from_slice(&bytes)?,
                None => Default::default(),
            };
        map.insert(original_key.to_string(), obfuscated.to_string());
        store.set(RECOVERY_MAP_KEY, &serde_json::to_vec(&map)?)
    }
}
