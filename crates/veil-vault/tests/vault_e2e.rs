//! End-to-end vault flows: rotation, reveal ritual, persistence.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use proptest::prelude::*;

use veil_vault::credential::hash_pin;
use veil_vault::reveal::Clock;
use veil_vault::{
    FileStore, KeyValueStore, MemoryStore, PinRotationOrchestrator, RevealController, SecretVault,
    VaultConfig, VaultError,
};

/// Manual clock shared between test and controller.
struct ManualClock(Mutex<SystemTime>);

impl ManualClock {
    fn start() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            SystemTime::UNIX_EPOCH + Duration::from_secs(10_000),
        )))
    }

    fn advance(&self, d: Duration) {
        *self.0.lock() += d;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.0.lock()
    }
}

fn seeded_vault(pin: &str) -> SecretVault<MemoryStore> {
    let vault = SecretVault::new(MemoryStore::new());
    vault.set_pin(pin, 100).unwrap();
    vault
}

#[test]
fn rotation_end_to_end() {
    let vault = seeded_vault("111111");
    vault.save("a", "secret of a", "111111").unwrap();
    vault.save("b", "secret of b", "111111").unwrap();

    let cfg = VaultConfig::default();
    let orch = PinRotationOrchestrator::new(&vault, &cfg);
    let outcome = orch.rotate("111111", "222222", |_| {}).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.rotated_count, 2);
    assert!(outcome.failed_accounts.is_empty());

    assert_eq!(vault.load("a", "222222").unwrap(), "secret of a");
    assert_eq!(vault.load("b", "222222").unwrap(), "secret of b");
    assert_eq!(
        vault.load("a", "111111").unwrap_err(),
        VaultError::DecryptionFailed
    );
    assert!(vault.verify_pin("222222").unwrap());
    assert!(!vault.verify_pin("111111").unwrap());
}

#[test]
fn rotation_partial_failure_keeps_going() {
    let vault = seeded_vault("111111");
    vault.save("a", "secret of a", "111111").unwrap();
    vault.save("b", "secret of b", "111111").unwrap();

    // Corrupt b's blob in place, as bit rot or tampering would.
    let key_b = vault.account_storage_key("b");
    let mut blob = vault.store().get(&key_b).unwrap().unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0xFF;
    vault.store().set(&key_b, &blob).unwrap();

    let cfg = VaultConfig::default();
    let orch = PinRotationOrchestrator::new(&vault, &cfg);
    let mut snapshots = Vec::new();
    let outcome = orch
        .rotate("111111", "222222", |p| snapshots.push(p.clone()))
        .unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.rotated_count, 1);
    assert_eq!(outcome.failed_accounts, vec!["b"]);

    // The healthy account is on the new PIN, the credential is updated,
    // and the corrupted blob decrypts under neither PIN.
    assert_eq!(vault.load("a", "222222").unwrap(), "secret of a");
    assert!(vault.verify_pin("222222").unwrap());
    assert_eq!(
        vault.load("b", "111111").unwrap_err(),
        VaultError::DecryptionFailed
    );
    assert_eq!(
        vault.load("b", "222222").unwrap_err(),
        VaultError::DecryptionFailed
    );

    let last = snapshots.last().unwrap();
    assert_eq!(last.completed + last.failed.len(), last.total);
}

#[test]
fn reveal_ritual_full_lifecycle() {
    let vault = seeded_vault("123456");
    vault.save("acct", "abandon ability able", "123456").unwrap();

    let clock = ManualClock::start();
    let mut ctl = RevealController::with_clock(VaultConfig::default(), clock.clone());

    // The UI verifies the PIN before scheduling.
    assert!(vault.verify_pin("123456").unwrap());
    ctl.schedule("acct").unwrap();
    assert!(ctl.status("acct").is_scheduled);

    // Too early to execute.
    assert!(matches!(
        ctl.execute("acct", "123456", &vault).unwrap_err(),
        VaultError::InvalidStateTransition(_)
    ));

    // Suspend/resume is just elapsed wall-clock time.
    clock.advance(Duration::from_secs(45));
    assert!(ctl.status("acct").is_available);
    assert_eq!(
        ctl.execute("acct", "123456", &vault).unwrap(),
        "abandon ability able"
    );

    // Window closes on its own.
    clock.advance(Duration::from_secs(200));
    assert!(ctl.status("acct").is_expired);
    assert!(ctl.execute("acct", "123456", &vault).is_err());

    // Acknowledge and start over.
    ctl.cancel("acct");
    ctl.schedule("acct").unwrap();
    assert!(ctl.status("acct").is_scheduled);
}

#[test]
fn cancelled_reveal_cannot_execute() {
    let vault = seeded_vault("123456");
    vault.save("acct", "phrase", "123456").unwrap();

    let clock = ManualClock::start();
    let mut ctl = RevealController::with_clock(VaultConfig::default(), clock.clone());
    ctl.schedule("acct").unwrap();
    ctl.cancel("acct");

    assert!(!ctl.status("acct").is_scheduled);
    clock.advance(Duration::from_secs(60));
    assert!(matches!(
        ctl.execute("acct", "123456", &vault).unwrap_err(),
        VaultError::InvalidStateTransition(_)
    ));
}

#[test]
fn file_store_vault_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    {
        let vault = SecretVault::new(FileStore::open(dir.path()).unwrap());
        vault.set_pin("123456", 100).unwrap();
        vault.save("acct", "persisted phrase", "123456").unwrap();
    }

    let vault = SecretVault::new(FileStore::open(dir.path()).unwrap());
    assert!(vault.verify_pin("123456").unwrap());
    assert_eq!(vault.list_accounts_with_data().unwrap(), vec!["acct"]);
    assert_eq!(vault.load("acct", "123456").unwrap(), "persisted phrase");
}

#[test]
fn cipher_roundtrip_unicode_and_long_secrets() {
    let vault = seeded_vault("123456");
    let secrets = [
        "word ".repeat(24),
        "héllo wörld — 秘密のフレーズ".to_string(),
        String::new(),
        "a".repeat(10_000),
    ];
    for (i, secret) in secrets.iter().enumerate() {
        let id = format!("acct-{i}");
        vault.save(&id, secret, "123456").unwrap();
        assert_eq!(&vault.load(&id, "123456").unwrap(), secret);
    }
}

proptest! {
    #[test]
    fn hashed_pin_verifies_itself(pin in "[0-9]{6}", iterations in 1u32..64) {
        let stored = hash_pin(&pin, iterations).unwrap();
        prop_assert!(stored.verify(&pin));
    }

    #[test]
    fn hashed_pin_rejects_other_pins(
        a in "[0-9]{6}",
        b in "[0-9]{6}",
        iterations in 1u32..64,
    ) {
        prop_assume!(a != b);
        let stored = hash_pin(&a, iterations).unwrap();
        prop_assert!(!stored.verify(&b));
    }

    #[test]
    fn non_six_digit_pins_rejected(pin in "[0-9]{0,5}|[0-9]{7,9}|[a-z]{6}") {
        prop_assert!(hash_pin(&pin, 10).is_err());
    }
}
