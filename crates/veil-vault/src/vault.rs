//! Encrypted per-account secret storage.
//!
//! [`SecretVault`] is the only component that touches raw storage: it
//! addresses entries through [`KeyObfuscator`] and protects content through
//! the PIN-derived cipher. Alongside the ciphertext blobs it keeps a
//! plaintext account index (account id -> obfuscated key). The index reveals
//! which accounts exist but nothing about their secrets; that existence leak
//! is accepted so the UI can show counts and the rotation orchestrator can
//! enumerate its work list.

use std::collections::BTreeMap;

use tracing::debug;

use crate::cipher;
use crate::credential::{self, HashedPin};
use crate::error::VaultError;
use crate::obfuscate::KeyObfuscator;
use crate::store::KeyValueStore;

/// Key type tag for per-account secret blobs.
pub const ACCOUNT_KEY_TYPE: &str = "account";

/// Key type tag for vault metadata entries.
const META_KEY_TYPE: &str = "meta";

/// Semantic name of the account index entry.
const INDEX_KEY: &str = "veil.account_index";

/// Semantic name of the PIN credential entry.
const CREDENTIAL_KEY: &str = "veil.pin_credential";

/// PIN-protected secret storage, one encrypted secret per account.
pub struct SecretVault<S: KeyValueStore> {
    store: S,
    obfuscator: KeyObfuscator,
}

impl<S: KeyValueStore> SecretVault<S> {
    /// Open a vault over the given store, loading or creating the device
    /// salt for key obfuscation.
    pub fn new(store: S) -> Self {
        let obfuscator = KeyObfuscator::load_or_create(&store);
        Self { store, obfuscator }
    }

    /// The underlying store. Mainly for diagnostics and tests.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The obfuscated storage key holding `account_id`'s secret blob.
    pub fn account_storage_key(&self, account_id: &str) -> String {
        self.obfuscator.obfuscate(account_id, ACCOUNT_KEY_TYPE)
    }

    // --- secrets ---

    /// Encrypt `secret` under `raw_pin` and store it for `account_id`,
    /// overwriting any previous value.
    pub fn save(&self, account_id: &str, secret: &str, raw_pin: &str) -> Result<(), VaultError> {
        credential::validate_pin_format(raw_pin)?;
        let blob = cipher::encrypt(secret, raw_pin)?;
        let key = self.account_storage_key(account_id);
        self.store.set(&key, &blob)?;

        let mut index = self.read_index()?;
        index.insert(account_id.to_string(), key);
        self.write_index(&index)?;
        debug!(account_id, "secret saved");
        Ok(())
    }

    /// Load and decrypt `account_id`'s secret.
    ///
    /// Fails with [`VaultError::NotFound`] when nothing is stored and with
    /// [`VaultError::DecryptionFailed`] when the PIN is wrong or the blob
    /// was corrupted.
    pub fn load(&self, account_id: &str, raw_pin: &str) -> Result<String, VaultError> {
        let key = self.account_storage_key(account_id);
        let blob = self
            .store
            .get(&key)?
            .ok_or_else(|| VaultError::NotFound(account_id.to_string()))?;
        cipher::decrypt(&blob, raw_pin)
    }

    /// Store an already-encrypted blob for `account_id`.
    ///
    /// Used by rotation to commit a re-encrypted secret without another
    /// decrypt round; the index entry must already exist.
    pub(crate) fn store_blob(&self, account_id: &str, blob: &[u8]) -> Result<(), VaultError> {
        let key = self.account_storage_key(account_id);
        self.store.set(&key, blob)
    }

    /// Remove `account_id`'s secret. No-op if absent.
    pub fn delete(&self, account_id: &str) -> Result<(), VaultError> {
        let key = self.account_storage_key(account_id);
        self.store.delete(&key)?;

        let mut index = self.read_index()?;
        if index.remove(account_id).is_some() {
            self.write_index(&index)?;
        }
        debug!(account_id, "secret deleted");
        Ok(())
    }

    /// Accounts that currently have a stored secret, in sorted order.
    pub fn list_accounts_with_data(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.read_index()?.into_keys().collect())
    }

    /// Move a secret stored under the legacy plain `account_id` key to its
    /// obfuscated key and register it in the index.
    ///
    /// Returns the new storage key, or `None` if there was nothing to
    /// migrate.
    pub fn migrate_legacy_account(&self, account_id: &str) -> Result<Option<String>, VaultError> {
        let Some(new_key) = self
            .obfuscator
            .migrate(&self.store, account_id, ACCOUNT_KEY_TYPE)?
        else {
            return Ok(None);
        };
        let mut index = self.read_index()?;
        index.insert(account_id.to_string(), new_key.clone());
        self.write_index(&index)?;
        Ok(Some(new_key))
    }

    /// Remove every entry in the backing store, secrets and metadata alike.
    pub fn wipe(&self) -> Result<(), VaultError> {
        self.store.clear_all()
    }

    // --- PIN credential ---

    /// Hash `raw_pin` and persist it as the vault's PIN credential,
    /// replacing any previous credential.
    pub fn set_pin(&self, raw_pin: &str, iterations: u32) -> Result<(), VaultError> {
        let hashed = credential::hash_pin(raw_pin, iterations)?;
        self.set_pin_credential(&hashed)
    }

    /// Whether a PIN credential has been set up.
    ///
    /// An existence check only; the record is not read or validated.
    pub fn has_pin(&self) -> Result<bool, VaultError> {
        let key = self.obfuscator.obfuscate(CREDENTIAL_KEY, META_KEY_TYPE);
        self.store.contains(&key)
    }

    /// Verify `raw_pin` against the stored credential.
    ///
    /// Fails with [`VaultError::PinNotSet`] when no credential exists;
    /// otherwise returns the boolean verdict only.
    pub fn verify_pin(&self, raw_pin: &str) -> Result<bool, VaultError> {
        let stored = self.pin_credential()?.ok_or(VaultError::PinNotSet)?;
        Ok(stored.verify(raw_pin))
    }

    /// Read the stored PIN credential, if any.
    pub fn pin_credential(&self) -> Result<Option<HashedPin>, VaultError> {
        let key = self.obfuscator.obfuscate(CREDENTIAL_KEY, META_KEY_TYPE);
        match self.store.get(&key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist a PIN credential record.
    pub fn set_pin_credential(&self, hashed: &HashedPin) -> Result<(), VaultError> {
        let key = self.obfuscator.obfuscate(CREDENTIAL_KEY, META_KEY_TYPE);
        self.store.set(&key, &serde_json::to_vec(hashed)?)
    }

    // --- account index ---

    fn read_index(&self) -> Result<BTreeMap<String, String>, VaultError> {
        let key = self.obfuscator.obfuscate(INDEX_KEY, META_KEY_TYPE);
        match self.store.get(&key)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(BTreeMap::new()),
        }
    }

    fn write_index(&self, index: &BTreeMap<String, String>) -> Result<(), VaultError> {
        let key = self.obfuscator.obfuscate(INDEX_KEY, META_KEY_TYPE);
        self.store.set(&key, &serde_json::to_vec(index)?)
    }
}
