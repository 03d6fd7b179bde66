//! Shared request pacing for one provider account
//!
//! Every request waits on the same [`RateLimiter`], so concurrently
//! reconciled zones draw from a single budget. A 429 pauses all of them.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct Pacing {
    last_request: Option<Instant>,
    blocked_until: Option<Instant>,
}

/// Minimum spacing between requests plus a provider-imposed pause
#[derive(Debug, Clone)]
pub struct RateLimiter {
    state: Arc<Mutex<Pacing>>,
    min_delay: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(Pacing {
                last_request: None,
                blocked_until: None,
            })),
            min_delay,
        }
    }

    /// Wait until the next request may be sent
    pub async fn wait(&self) {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let mut ready = now;
        if let Some(last) = state.last_request {
            ready = ready.max(last + self.min_delay);
        }
        if let Some(until) = state.blocked_until {
            ready = ready.max(until);
        }

        if ready > now {
            tokio::time::sleep_until(ready).await;
        }

        state.last_request = Some(Instant::now());
        state.blocked_until = None;
    }

    /// Hold every caller for at least `delay` from now
    pub async fn block_for(&self, delay: Duration) {
        let mut state = self.state.lock().await;
        let until = Instant::now() + delay;
        state.blocked_until = Some(state.blocked_until.map_or(until, |b| b.max(until)));
        tracing::debug!("Rate limiter blocked for {:.1}s", delay.as_secs_f32());
    }
}
