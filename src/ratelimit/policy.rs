//! Rate limit policy: window length and request budget.

use std::num::{NonZeroU32, NonZeroU64};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BouncerError, Result};

/// Default window length in milliseconds (one minute).
pub const DEFAULT_WINDOW_MS: u64 = 60_000;
/// Default number of admitted requests per key per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 20;

const DEFAULT_WINDOW: NonZeroU64 = match NonZeroU64::new(DEFAULT_WINDOW_MS) {
    Some(v) => v,
    None => panic!("DEFAULT_WINDOW_MS must be non-zero"),
};
const DEFAULT_BUDGET: NonZeroU32 = match NonZeroU32::new(DEFAULT_MAX_REQUESTS) {
    Some(v) => v,
    None => panic!("DEFAULT_MAX_REQUESTS must be non-zero"),
};

/// How many requests a key may make within one fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy", into = "RawPolicy")]
pub struct Policy {
    window_ms: NonZeroU64,
    max_requests: NonZeroU32,
}

/// Wire form of a policy, validated on the way in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawPolicy {
    window_ms: u64,
    max_requests: u32,
}

impl Policy {
    /// Create a policy, rejecting a zero window or zero budget.
    pub fn new(window_ms: u64, max_requests: u32) -> Result<Self> {
        let window_ms = NonZeroU64::new(window_ms).ok_or_else(|| {
            BouncerError::InvalidPolicy("window_ms must be greater than zero".to_string())
        })?;
        let max_requests = NonZeroU32::new(max_requests).ok_or_else(|| {
            BouncerError::InvalidPolicy("max_requests must be greater than zero".to_string())
        })?;

        Ok(Self {
            window_ms,
            max_requests,
        })
    }

    /// Length of one window in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms.get()
    }

    /// Length of one window.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms.get())
    }

    /// Maximum admitted requests per key per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests.get()
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW,
            max_requests: DEFAULT_BUDGET,
        }
    }
}

impl TryFrom<RawPolicy> for Policy {
    type Error = BouncerError;

    fn try_from(raw: RawPolicy) -> Result<Self> {
        Policy::new(raw.window_ms, raw.max_requests)
    }
}

impl From<Policy> for RawPolicy {
    fn from(policy: Policy) -> Self {
        Self {
            window_ms: policy.window_ms(),
            max_requests: policy.max_requests(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = Policy::default();
        assert_eq!(policy.window_ms(), 60_000);
        assert_eq!(policy.max_requests(), 20);
        assert_eq!(policy.window(), Duration::from_secs(60));
        assert_eq!(Policy::new(DEFAULT_WINDOW_MS, DEFAULT_MAX_REQUESTS).unwrap(), policy);
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = Policy::new(0, 5).unwrap_err();
        assert!(matches!(err, BouncerError::InvalidPolicy(_)));
    }

    #[test]
    fn test_zero_budget_rejected() {
        let err = Policy::new(1000, 0).unwrap_err();
        assert!(matches!(err, BouncerError::InvalidPolicy(_)));
    }

    #[test]
    fn test_deserialize_validates() {
        let policy: Policy = serde_yaml::from_str("window_ms: 1000\nmax_requests: 3").unwrap();
        assert_eq!(policy, Policy::new(1000, 3).unwrap());

        let bad = serde_yaml::from_str::<Policy>("window_ms: 1000\nmax_requests: 0");
        assert!(bad.is_err());
    }
}
