//! Per-identifier login throttle.
//!
//! Each identifier (username or email, as normalized by the auth service) owns an
//! async mutex. Login holds it from the lockout check until the outcome is
//! recorded, so concurrent attempts against one identifier are linearized and
//! cannot slip extra failures past the threshold. Identifiers never contend with
//! each other.
//!
//! The failure count only resets on a successful login. Once the lockout window
//! has passed, attempts are allowed again, but the count keeps growing and a
//! single further failure locks the identifier again.

use std::sync::Arc;

use dashmap::DashMap;
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::config::ThrottleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub max_failures: u32,
    pub lockout_window: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::from(&ThrottleConfig::default())
    }
}

impl From<&ThrottleConfig> for ThrottlePolicy {
    fn from(cfg: &ThrottleConfig) -> Self {
        Self {
            max_failures: cfg.max_failures,
            lockout_window: Duration::seconds(cfg.lockout_seconds),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Locked; `retry_after` is the remaining window in whole seconds.
    Deny { retry_after: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Clear,
    Warned,
    Locked,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptState {
    pub failures: u32,
    pub last_failure: Option<OffsetDateTime>,
}

impl AttemptState {
    pub fn phase(&self, policy: &ThrottlePolicy, now: OffsetDateTime) -> Phase {
        match (self.failures, self.last_failure) {
            (0, _) => Phase::Clear,
            (n, Some(last)) if n >= policy.max_failures && now - last < policy.lockout_window => {
                Phase::Locked
            }
            _ => Phase::Warned,
        }
    }

    fn decide(&self, policy: &ThrottlePolicy, now: OffsetDateTime) -> Decision {
        match (self.phase(policy, now), self.last_failure) {
            (Phase::Locked, Some(last)) => {
                let remaining = policy.lockout_window - (now - last);
                let secs = remaining.whole_seconds() + i64::from(remaining.subsec_nanoseconds() > 0);
                Decision::Deny {
                    retry_after: secs.max(1) as u64,
                }
            }
            _ => Decision::Allow,
        }
    }
}

type Slot = Arc<Mutex<AttemptState>>;

/// Process-wide login attempt bookkeeping. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    entries: Arc<DashMap<String, Slot>>,
    policy: ThrottlePolicy,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(ThrottlePolicy::default())
    }
}

impl LoginThrottle {
    pub fn new(policy: ThrottlePolicy) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            policy,
        }
    }

    /// Takes exclusive hold of `identifier`'s state until the guard is dropped.
    pub async fn acquire(&self, identifier: &str) -> AttemptGuard {
        // Clone the slot while the shard lock is held so `prune` never sees it as unused.
        let slot: Slot = self
            .entries
            .entry(identifier.to_owned())
            .or_default()
            .value()
            .clone();
        AttemptGuard {
            identifier: identifier.to_owned(),
            state: slot.lock_owned().await,
            policy: self.policy,
        }
    }

    pub async fn check(&self, identifier: &str, now: OffsetDateTime) -> Decision {
        self.acquire(identifier).await.check(now)
    }

    pub async fn record_failure(&self, identifier: &str, now: OffsetDateTime) {
        self.acquire(identifier).await.record_failure(now);
    }

    pub async fn record_success(&self, identifier: &str, now: OffsetDateTime) {
        self.acquire(identifier).await.record_success(now);
    }

    pub async fn failures(&self, identifier: &str) -> u32 {
        let slot = match self.entries.get(identifier) {
            Some(slot) => slot.value().clone(),
            None => return 0,
        };
        let failures = slot.lock().await.failures;
        failures
    }

    /// Drops entries with no recorded failures that nobody is holding.
    /// Entries carrying failures are kept, so pruning never shortens a lockout.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            slot.try_lock().map(|s| s.failures > 0).unwrap_or(true)
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "pruned idle login throttle entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Exclusive access to one identifier's attempt state.
pub struct AttemptGuard {
    identifier: String,
    state: OwnedMutexGuard<AttemptState>,
    policy: ThrottlePolicy,
}

impl AttemptGuard {
    pub fn check(&self, now: OffsetDateTime) -> Decision {
        self.state.decide(&self.policy, now)
    }

    pub fn record_failure(&mut self, now: OffsetDateTime) {
        self.state.failures = self.state.failures.saturating_add(1);
        self.state.last_failure = Some(now);
        if self.state.phase(&self.policy, now) == Phase::Locked {
            warn!(identifier = %self.identifier, failures = self.state.failures, "login locked");
        } else {
            debug!(identifier = %self.identifier, failures = self.state.failures, "login failure recorded");
        }
    }

    pub fn record_success(&mut self, now: OffsetDateTime) {
        self.state.failures = 0;
        self.state.last_failure = Some(now);
    }

    pub fn failures(&self) -> u32 {
        self.state.failures
    }
}
