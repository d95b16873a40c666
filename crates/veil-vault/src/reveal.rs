//! Time-locked reveal state machine.
//!
//! Revealing a recovery phrase is deliberately slow: the caller schedules a
//! reveal, waits out a mandatory delay, and may then execute it only inside
//! a bounded availability window. Per account the states are
//!
//! ```text
//! NONE -> SCHEDULED -> AVAILABLE -> (revealed, transient) -> NONE
//!            |              |
//!            +-> EXPIRED ---+--> NONE (cancel / acknowledge)
//! ```
//!
//! Status is a pure function of the stored timestamps and the current time,
//! so no background timer is needed: after a process suspend/resume,
//! recomputing status yields the correct state. Executing a reveal does not
//! consume the schedule; within one availability window the secret may be
//! re-displayed without re-running the wait. The 30-second auto-hide of a
//! displayed secret is owned by the caller (see
//! [`VaultConfig::display_duration`]).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::store::KeyValueStore;
use crate::vault::SecretVault;

/// Source of the current wall-clock time.
///
/// Production uses [`SystemClock`]; tests substitute a manual clock to walk
/// through the state machine without sleeping.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> SystemTime;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> SystemTime {
        (**self).now()
    }
}

/// A reveal in flight for one account.
#[derive(Debug, Clone)]
pub struct RevealSchedule {
    /// When the reveal was requested.
    pub scheduled_at: SystemTime,
    /// Mandatory wait before the secret becomes available.
    pub wait: Duration,
    /// Length of the availability window after the wait.
    pub window: Duration,
}

impl RevealSchedule {
    /// Instant at which the reveal becomes executable.
    pub fn available_at(&self) -> SystemTime {
        self.scheduled_at + self.wait
    }

    /// Instant at which the availability window closes.
    pub fn expires_at(&self) -> SystemTime {
        self.scheduled_at + self.wait + self.window
    }
}

/// Snapshot of one account's reveal state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevealStatus {
    /// A reveal is scheduled and still waiting out its delay.
    pub is_scheduled: bool,
    /// The reveal may be executed right now.
    pub is_available: bool,
    /// The window elapsed without execution (or after the last execution).
    pub is_expired: bool,
    /// Time left until the secret becomes available, while waiting.
    pub wait_remaining: Option<Duration>,
    /// Time left in the availability window, while available.
    pub expires_in: Option<Duration>,
}

impl RevealStatus {
    fn none() -> Self {
        Self::default()
    }
}

/// Per-account gate between "the user asked to see a secret" and "the
/// secret is on screen".
///
/// The controller never stores a PIN. Scheduling must only be called after
/// the caller has verified the PIN (the UI gates it behind a PIN prompt);
/// execution takes the raw PIN because decryption needs it.
pub struct RevealController<C: Clock = SystemClock> {
    schedules: HashMap<String, RevealSchedule>,
    config: VaultConfig,
    clock: C,
}

impl RevealController<SystemClock> {
    /// Controller over the system clock.
    pub fn new(config: VaultConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> RevealController<C> {
    /// Controller over an explicit clock. Used by tests.
    pub fn with_clock(config: VaultConfig, clock: C) -> Self {
        Self {
            schedules: HashMap::new(),
            config,
            clock,
        }
    }

    /// How long the caller should keep a revealed secret on screen.
    pub fn display_duration(&self) -> Duration {
        self.config.display_duration
    }

    /// Schedule a reveal for `account_id`.
    ///
    /// Legal only when no reveal is in flight (or the previous one has
    /// expired, which this call replaces). The caller must have verified
    /// the PIN immediately before calling; the controller does not re-check
    /// it and does not hold it.
    pub fn schedule(&mut self, account_id: &str) -> Result<RevealSchedule, VaultError> {
        let now = self.clock.now();
        if let Some(existing) = self.schedules.get(account_id) {
            if now < existing.expires_at() {
                return Err(VaultError::InvalidStateTransition(format!(
                    "reveal already in flight for account {account_id}"
                )));
            }
            // Expired: fall through and replace.
        }

        let schedule = RevealSchedule {
            scheduled_at: now,
            wait: self.config.reveal_wait,
            window: self.config.reveal_window,
        };
        self.schedules
            .insert(account_id.to_string(), schedule.clone());
        debug!(account_id, wait_secs = schedule.wait.as_secs(), "reveal scheduled");
        Ok(schedule)
    }

    /// Current status for `account_id`, computed from the clock.
    pub fn status(&self, account_id: &str) -> RevealStatus {
        match self.schedules.get(account_id) {
            Some(schedule) => status_at(schedule, self.clock.now()),
            None => RevealStatus::none(),
        }
    }

    /// Execute a reveal: decrypt and return the secret.
    ///
    /// Legal only inside the availability window; fails with
    /// [`VaultError::InvalidStateTransition`] otherwise, without mutating
    /// state. The schedule stays alive until it expires on its own, so the
    /// secret may be re-displayed within the same window.
    pub fn execute<S: KeyValueStore>(
        &self,
        account_id: &str,
        raw_pin: &str,
        vault: &SecretVault<S>,
    ) -> Result<String, VaultError> {
        if !self.status(account_id).is_available {
            return Err(VaultError::InvalidStateTransition(format!(
                "reveal for account {account_id} is not available"
            )));
        }
        vault.load(account_id, raw_pin)
    }

    /// Cancel any reveal for `account_id`, returning the account to the
    /// idle state. Always safe: a no-op when nothing is in flight, and also
    /// how an expired schedule is acknowledged and discarded.
    pub fn cancel(&mut self, account_id: &str) {
        if self.schedules.remove(account_id).is_some() {
            debug!(account_id, "reveal cancelled");
        }
    }
}

/// Pure status computation: `now` against the schedule's derived instants.
fn status_at(schedule: &RevealSchedule, now: SystemTime) -> RevealStatus {
    let available_at = schedule.available_at();
    let expires_at = schedule.expires_at();

    if now < available_at {
        RevealStatus {
            is_scheduled: true,
            wait_remaining: available_at.duration_since(now).ok(),
            ..RevealStatus::none()
        }
    } else if now < expires_at {
        RevealStatus {
            is_available: true,
            expires_in: expires_at.duration_since(now).ok(),
            ..RevealStatus::none()
        }
    } else {
        RevealStatus {
            is_expired: true,
            ..RevealStatus::none()
        }
    }
}
