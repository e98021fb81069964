//! Rate limiting logic and state management.

mod clock;
mod counter;
mod key;
mod limiter;
mod policy;
mod rules;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::RateLimitRecord;
pub use key::{client_ip, daily_key, ip_key, user_key, UNKNOWN_CLIENT};
pub use limiter::{RateLimitDecision, RateLimiter};
pub use policy::{Policy, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS};
pub use rules::RuleSet;
