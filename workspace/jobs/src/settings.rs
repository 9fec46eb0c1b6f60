use std::time::Duration;

use rust_decimal::Decimal;

use crate::retry::RetryPolicy;

/// Tunables for the job pipeline, filled from the application config.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Percentage of the budget at which an alert goes out.
    pub alert_threshold_percent: Decimal,
    /// ISO code used when formatting amounts in notifications.
    pub currency_code: String,
    pub retry: RetryPolicy,
    /// Replays allowed per user within `throttle_period`.
    pub throttle_limit: u32,
    pub throttle_period: Duration,
    pub queue_capacity: usize,
    /// Entries kept in the failed-jobs registry before the oldest is evicted.
    pub failed_jobs_capacity: usize,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            alert_threshold_percent: Decimal::new(80, 0),
            currency_code: "USD".to_string(),
            retry: RetryPolicy::default(),
            throttle_limit: 10,
            throttle_period: Duration::from_secs(60),
            queue_capacity: 1024,
            failed_jobs_capacity: 500,
        }
    }
}
