//! Vault configuration.

use std::time::Duration;

/// Number of SHA-256 rounds applied when hashing a PIN for storage.
pub const DEFAULT_PIN_ITERATIONS: u32 = 1000;

/// Configuration for the vault and the reveal state machine.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// SHA-256 iteration count for the stored PIN credential.
    pub pin_iterations: u32,
    /// Mandatory wait between scheduling a reveal and it becoming available.
    pub reveal_wait: Duration,
    /// Length of the window during which a scheduled reveal may be executed.
    pub reveal_window: Duration,
    /// How long the caller should display a revealed secret before hiding it.
    /// The timer itself is owned by the UI layer; the vault only advertises
    /// the recommended duration.
    pub display_duration: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            pin_iterations: DEFAULT_PIN_ITERATIONS,
            reveal_wait: Duration::from_secs(30),
            reveal_window: Duration::from_secs(120),
            display_duration: Duration::from_secs(30),
        }
    }
}

impl VaultConfig {
    /// Preset with sub-second reveal timings, for tests and demos.
    pub fn fast() -> Self {
        Self {
            reveal_wait: Duration::from_millis(50),
            reveal_window: Duration::from_millis(200),
            display_duration: Duration::from_secs(2),
            ..Self::default()
        }
    }
}
