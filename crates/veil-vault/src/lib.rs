//! # veil-vault — PIN-protected recovery-phrase vault.
//!
//! Protects per-account recovery mnemonics behind a six-digit PIN. Secrets
//! are encrypted with a PIN-derived key, stored under obfuscated key names,
//! disclosed only through a time-locked reveal ritual, and re-encrypted in
//! bulk when the PIN changes.
//!
//! # Modules
//!
//! - [`error`] — `VaultError` enum
//! - [`config`] — timing and hashing parameters
//! - [`store`] — `KeyValueStore` trait, in-memory and file-backed stores
//! - [`credential`] — iterated-SHA-256 PIN hashing and verification
//! - [`cipher`] — Argon2id + AES-256-GCM secret encryption
//! - [`obfuscate`] — device-salted storage key obfuscation
//! - [`vault`] — per-account encrypted secret storage
//! - [`reveal`] — time-locked reveal state machine
//! - [`rotation`] — best-effort PIN rotation across all accounts

pub mod cipher;
pub mod config;
pub mod credential;
pub mod error;
pub mod obfuscate;
pub mod reveal;
pub mod rotation;
pub mod store;
pub mod vault;

// Re-exports for convenient access
pub use config::VaultConfig;
pub use credential::HashedPin;
pub use error::VaultError;
pub use obfuscate::KeyObfuscator;
pub use reveal::{Clock, RevealController, RevealStatus, SystemClock};
pub use rotation::{PinRotationOrchestrator, RotationOutcome, RotationProgress};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use vault::SecretVault;
