//! Background maintenance tasks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::http::RateLimitService;
use crate::ratelimit::{RateLimiter, RuleSet};

/// Periodically drop records whose window has ended.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    info!(interval = ?every, "Starting expired record sweeper");

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            limiter.sweep_expired();
        }
    })
}

/// Periodically re-read the rules file into `service`.
///
/// A file that fails to load leaves the current rules in place.
pub fn spawn_rules_reloader(
    service: RateLimitService,
    path: PathBuf,
    every: Duration,
) -> JoinHandle<()> {
    info!(path = %path.display(), interval = ?every, "Starting rules reloader");

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match RuleSet::from_file(&path) {
                Ok(rules) => {
                    if rules != service.rules() {
                        info!(functions = rules.functions.len(), "Rate limit rules reloaded");
                        service.set_rules(rules);
                    }
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Keeping previous rules");
                }
            }
        }
    })
}
