use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::debug;

use crate::error::{JobError, Result};

/// Per-user rate limiter for recurring-transaction replays.
///
/// Allows `limit` replays per `period` for each user, refilling continuously
/// (GCRA). Callers over the cap wait for capacity instead of being dropped.
/// Cloning shares the underlying limiter state.
#[derive(Clone)]
pub struct UserThrottle {
    limiter: Arc<DefaultKeyedRateLimiter<i32>>,
    limit: u32,
    period: Duration,
}

impl UserThrottle {
    pub fn new(limit: u32, period: Duration) -> Result<Self> {
        let burst = NonZeroU32::new(limit)
            .ok_or_else(|| JobError::Validation("throttle limit must be positive".to_string()))?;
        let quota = Quota::with_period(period / limit)
            .ok_or_else(|| JobError::Validation("throttle period must be positive".to_string()))?
            .allow_burst(burst);

        Ok(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            limit,
            period,
        })
    }

    /// Waits until `user_id` has capacity, then consumes one cell.
    pub async fn acquire(&self, user_id: i32) {
        if self.limiter.check_key(&user_id).is_ok() {
            return;
        }
        debug!(
            "User {} exceeded {} replays per {:?}, deferring",
            user_id, self.limit, self.period
        );
        self.limiter.until_key_ready(&user_id).await;
    }

    /// Consumes one cell for `user_id` if available without waiting.
    pub fn try_acquire(&self, user_id: i32) -> bool {
        self.limiter.check_key(&user_id).is_ok()
    }
}
