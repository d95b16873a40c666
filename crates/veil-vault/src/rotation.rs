//! PIN rotation: re-encrypt every stored secret under a new PIN.
//!
//! Rotation is a best-effort sequential batch. Each account is decrypted
//! with the old PIN and re-encrypted with the new one; an account that
//! fails is recorded and skipped, never aborting the batch. Accounts that
//! succeeded are committed immediately, so a partial failure leaves a mixed
//! state: rotated accounts under the new PIN, failed accounts still under
//! the old one. The caller must surface the failure list as actionable
//! follow-up (those secrets need to be re-entered manually).
//!
//! There is no rotation-in-progress marker. A process killed mid-rotation
//! likewise leaves a mixed-PIN state, detectable only by per-account
//! decrypt failures afterwards.

use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::cipher;
use crate::config::VaultConfig;
use crate::credential;
use crate::error::VaultError;
use crate::store::KeyValueStore;
use crate::vault::SecretVault;

/// Mutable progress snapshot passed to the rotation callback after every
/// account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationProgress {
    /// Number of accounts in the work list.
    pub total: usize,
    /// Accounts successfully re-encrypted so far.
    pub completed: usize,
    /// Accounts that failed to decrypt or re-encrypt.
    pub failed: Vec<String>,
    /// The account just processed.
    pub current: Option<String>,
}

/// Final result of one rotation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    /// True only when every account rotated cleanly.
    pub success: bool,
    /// Number of accounts now encrypted under the new PIN.
    pub rotated_count: usize,
    /// Accounts left encrypted under the old PIN.
    pub failed_accounts: Vec<String>,
    /// Set when rotation did not run at all (wrong old PIN).
    pub error: Option<VaultError>,
}

/// Orchestrates changing the vault PIN and re-encrypting all secrets.
pub struct PinRotationOrchestrator<'a, S: KeyValueStore> {
    vault: &'a SecretVault<S>,
    pin_iterations: u32,
}

impl<'a, S: KeyValueStore> PinRotationOrchestrator<'a, S> {
    /// Orchestrator over `vault`, hashing the new PIN with the configured
    /// iteration count.
    pub fn new(vault: &'a SecretVault<S>, config: &VaultConfig) -> Self {
        Self {
            vault,
            pin_iterations: config.pin_iterations,
        }
    }

    /// Check that `old_raw_pin` is the vault's current PIN.
    ///
    /// Beyond the credential hash, when any account has stored data this
    /// trial-decrypts one secret, catching a credential record that has
    /// drifted out of sync with the encryption key material after an
    /// earlier partial failure.
    pub fn validate_old_pin(&self, old_raw_pin: &str) -> Result<bool, VaultError> {
        if !self.vault.verify_pin(old_raw_pin)? {
            return Ok(false);
        }
        let accounts = self.vault.list_accounts_with_data()?;
        let Some(first) = accounts.first() else {
            return Ok(true);
        };
        match self.vault.load(first, old_raw_pin) {
            Ok(_) => Ok(true),
            Err(VaultError::DecryptionFailed) => Ok(false),
            // A stale index entry says nothing about the PIN.
            Err(VaultError::NotFound(_)) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// Rotate the vault from `old_raw_pin` to `new_raw_pin`.
    ///
    /// Processes every account in enumeration order, invoking `on_progress`
    /// after each one with the current [`RotationProgress`]. Per-account
    /// failures are collected, not fatal. After the full list is processed,
    /// a fresh credential for the new PIN is persisted, even when some
    /// accounts failed (those stay under the old PIN).
    ///
    /// A wrong old PIN yields an outcome with `success == false` and
    /// `error == Some(DecryptionFailed)` without touching any account.
    /// Storage failures propagate as hard errors.
    pub fn rotate(
        &self,
        old_raw_pin: &str,
        new_raw_pin: &str,
        mut on_progress: impl FnMut(&RotationProgress),
    ) -> Result<RotationOutcome, VaultError> {
        credential::validate_pin_format(old_raw_pin)?;
        credential::validate_pin_format(new_raw_pin)?;

        if !self.validate_old_pin(old_raw_pin)? {
            return Ok(RotationOutcome {
                success: false,
                rotated_count: 0,
                failed_accounts: Vec::new(),
                error: Some(VaultError::DecryptionFailed),
            });
        }

        let accounts = self.vault.list_accounts_with_data()?;
        info!(total = accounts.len(), "PIN rotation started");

        let mut progress = RotationProgress {
            total: accounts.len(),
            completed: 0,
            failed: Vec::new(),
            current: None,
        };

        for account_id in &accounts {
            progress.current = Some(account_id.clone());
            match self.rotate_one(account_id, old_raw_pin, new_raw_pin) {
                Ok(()) => progress.completed += 1,
                Err(e) => {
                    warn!(account_id = %account_id, error = %e, "account failed to rotate, leaving it on the old PIN");
                    progress.failed.push(account_id.clone());
                }
            }
            on_progress(&progress);
        }

        let new_credential = credential::hash_pin(new_raw_pin, self.pin_iterations)?;
        self.vault.set_pin_credential(&new_credential)?;

        info!(
            rotated = progress.completed,
            failed = progress.failed.len(),
            "PIN rotation finished"
        );
        Ok(RotationOutcome {
            success: progress.failed.is_empty(),
            rotated_count: progress.completed,
            failed_accounts: progress.failed,
            error: None,
        })
    }

    /// Decrypt one account with the old PIN and commit it re-encrypted
    /// under the new PIN. The plaintext lives only for the span of this
    /// call and is zeroized on drop.
    fn rotate_one(
        &self,
        account_id: &str,
        old_raw_pin: &str,
        new_raw_pin: &str,
    ) -> Result<(), VaultError> {
        let secret = Zeroizing::new(self.vault.load(account_id, old_raw_pin)?);
        let blob = cipher::encrypt(&secret, new_raw_pin)?;
        self.vault.store_blob(account_id, &blob)
    }
}
