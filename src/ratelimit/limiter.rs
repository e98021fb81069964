//! Core rate limiter implementation.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::counter::RateLimitRecord;
use super::policy::Policy;

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Requests counted in the key's current window
    pub count: u32,
    /// Budget left in the current window
    pub remaining: u32,
    /// End of the current window, in epoch milliseconds
    pub reset_at_ms: u64,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at_ms.saturating_sub(now_ms).div_ceil(1000)
    }
}

/// Fixed-window rate limiter keyed by caller identity.
///
/// Records live for the lifetime of the limiter. Nothing is evicted unless
/// [`RateLimiter::sweep_expired`] is called.
pub struct RateLimiter {
    /// Active records indexed by caller key
    records: DashMap<String, RateLimitRecord>,
    /// Time source for window arithmetic
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter on the system wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a rate limiter with an injected time source.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    /// Current time according to this limiter's clock.
    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Admit or reject one request for `key`.
    pub fn check_and_consume(&self, key: &str, policy: &Policy) -> bool {
        self.check(key, policy).allowed
    }

    /// Admit or reject one request for `key`, reporting the window state.
    ///
    /// The expiry check, cap check and increment happen under the entry lock
    /// for `key`, so concurrent callers on the same key cannot both slip under
    /// the budget.
    pub fn check(&self, key: &str, policy: &Policy) -> RateLimitDecision {
        let now = self.clock.now_millis();

        let (allowed, record) = match self.records.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.is_expired(now) {
                    trace!(key = %key, "Window expired, opening a new one");
                    *record = RateLimitRecord::open(now, policy);
                    (true, *record)
                } else {
                    let allowed = record.try_consume(policy);
                    (allowed, *record)
                }
            }
            Entry::Vacant(vacant) => {
                debug!(
                    key = %key,
                    window_ms = policy.window_ms(),
                    max_requests = policy.max_requests(),
                    "Creating new rate limit record"
                );
                let record = RateLimitRecord::open(now, policy);
                vacant.insert(record);
                (true, record)
            }
        };

        if !allowed {
            debug!(key = %key, count = record.count(), "Rate limit exceeded");
        }

        RateLimitDecision {
            allowed,
            count: record.count(),
            remaining: record.remaining(policy),
            reset_at_ms: record.reset_at(),
        }
    }

    /// Get the current count for a key.
    ///
    /// Returns `None` if no record exists for the key. An expired record still
    /// reports its last count until the key is seen again or swept.
    pub fn count(&self, key: &str) -> Option<u32> {
        self.records.get(key).map(|r| r.count())
    }

    /// Remove every record whose window has ended. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let removed = before.saturating_sub(self.records.len());

        if removed > 0 {
            debug!(removed = removed, remaining = self.records.len(), "Swept expired records");
        }
        removed
    }

    /// Clear all records.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.records.clear();
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("records", &self.records.len())
            .field("clock", &self.clock)
            .finish()
    }
}
