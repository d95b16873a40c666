//! PIN credential hashing and verification.
//!
//! A PIN is never stored raw: setup produces a [`HashedPin`] record holding a
//! per-credential random salt, the iterated SHA-256 digest, and the iteration
//! count. Verification recomputes the digest and compares it in constant
//! time, so the comparison cost does not depend on where a mismatch occurs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::VaultError;

/// Required PIN length: exactly six ASCII digits.
pub const PIN_LENGTH: usize = 6;

/// Salt length for the stored credential.
pub const CREDENTIAL_SALT_LEN: usize = 16;

/// A stored PIN credential: salt, iterated digest, and iteration count.
///
/// Not reversible to the raw PIN; safe to persist and to print in logs
/// (though there is rarely a reason to).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashedPin {
    /// Per-credential random salt.
    pub salt: [u8; CREDENTIAL_SALT_LEN],
    /// `SHA256` applied `iterations` times over `salt || pin`.
    pub hash: [u8; 32],
    /// Number of SHA-256 rounds, fixed at credential creation.
    pub iterations: u32,
}

/// Check that a candidate PIN is exactly six ASCII digits.
pub fn validate_pin_format(pin: &str) -> Result<(), VaultError> {
    if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(VaultError::InvalidPinFormat)
    }
}

/// Hash a raw PIN into a storable [`HashedPin`] with a fresh random salt.
///
/// Rejects PINs that are not exactly six ASCII digits and an `iterations`
/// of zero ([`VaultError::InvalidIterations`]); round zero is
/// `SHA256(salt || pin)` and each further round re-hashes the previous
/// digest.
pub fn hash_pin(raw_pin: &str, iterations: u32) -> Result<HashedPin, VaultError> {
    validate_pin_format(raw_pin)?;
    if iterations == 0 {
        return Err(VaultError::InvalidIterations);
    }

    use rand::RngCore;
    let mut salt = [0u8; CREDENTIAL_SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let hash = iterated_digest(&salt, raw_pin, iterations);
    Ok(HashedPin {
        salt,
        hash,
        iterations,
    })
}

impl HashedPin {
    /// Verify a candidate PIN against this credential.
    ///
    /// Returns `false` for a wrong PIN, a malformed PIN, or any internal
    /// inconsistency (such as a zero iteration count in a corrupted record).
    /// Collapsing those cases into one boolean keeps callers from learning
    /// whether storage was tampered with by probing the verifier.
    pub fn verify(&self, candidate: &str) -> bool {
        if validate_pin_format(candidate).is_err() || self.iterations == 0 {
            return false;
        }
        let computed = iterated_digest(&self.salt, candidate, self.iterations);
        bool::from(computed.ct_eq(&self.hash))
    }
}

fn iterated_digest(salt: &[u8], pin: &str, iterations: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(pin.as_bytes());
    let mut digest: [u8; 32] = hasher.finalize().into();
    for _ in 1..iterations {
        digest = Sha256::digest(digest).into();
    }
    digest
}
