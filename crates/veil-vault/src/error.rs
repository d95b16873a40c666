//! Vault error types.

use thiserror::Error;

/// Errors that can occur in vault operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    /// PIN is not exactly six ASCII digits.
    #[error("invalid PIN format: expected exactly 6 digits")]
    InvalidPinFormat,

    /// No secret stored for the given account.
    #[error("no secret stored for account {0}")]
    NotFound(String),

    /// Decryption failed: wrong PIN or corrupted ciphertext.
    ///
    /// The two causes are deliberately indistinguishable so a caller probing
    /// the vault cannot tell "wrong PIN" apart from "tampered data".
    #[error("decryption failed")]
    DecryptionFailed,

    /// Credential iteration count outside the supported range.
    #[error("invalid iteration count: must be at least 1")]
    InvalidIterations,

    /// Encryption failed (key derivation or cipher setup).
    #[error("encryption: {0}")]
    Encryption(String),

    /// A reveal operation was attempted in a state that does not permit it.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// The underlying key-value store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// No PIN credential has been set up yet.
    #[error("no PIN configured")]
    PinNotSet,

    /// Serialization of an index or credential record failed.
    #[error("serialization: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}
