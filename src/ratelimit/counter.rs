//! Per-key fixed-window record.

use super::policy::Policy;

/// Request count for one key within its current window.
///
/// Windows are fixed, not sliding: a caller can land up to twice the budget
/// in a burst that straddles `reset_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRecord {
    /// Requests counted in the current window, never above the policy budget
    count: u32,
    /// Absolute end of the current window, in epoch milliseconds
    reset_at: u64,
}

impl RateLimitRecord {
    /// Open a new window at `now` with the first request already counted.
    pub fn open(now: u64, policy: &Policy) -> Self {
        Self {
            count: 1,
            reset_at: now.saturating_add(policy.window_ms()),
        }
    }

    /// Whether the window has ended at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        self.reset_at <= now
    }

    /// Count one more request if the budget allows it.
    ///
    /// Rejected attempts leave both the count and the window untouched.
    pub fn try_consume(&mut self, policy: &Policy) -> bool {
        if self.count >= policy.max_requests() {
            return false;
        }
        self.count += 1;
        true
    }

    /// Requests counted in the current window.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// End of the current window.
    pub fn reset_at(&self) -> u64 {
        self.reset_at
    }

    /// Remaining budget in the current window.
    pub fn remaining(&self, policy: &Policy) -> u32 {
        policy.max_requests().saturating_sub(self.count)
    }
}
