use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{RECURRING_TRANSACTION_EVENT, RecurringTransactionEvent};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use crate::error::{JobError, Result};
use crate::events::validate_event;
use crate::processor::{ProcessOutcome, process_recurring_transaction};
use crate::retry::RetryPolicy;
use crate::settings::JobSettings;
use crate::throttle::UserThrottle;

/// A work item that could not be processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedJob {
    pub event: RecurringTransactionEvent,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Bounded, shared list of failed work items, oldest evicted first.
#[derive(Clone)]
pub struct FailedJobs {
    entries: Arc<RwLock<VecDeque<FailedJob>>>,
    capacity: usize,
}

impl FailedJobs {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(&self, job: FailedJob) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(job);
    }

    /// Newest first.
    pub async fn list(&self) -> Vec<FailedJob> {
        self.entries.read().await.iter().rev().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Consumes recurring-transaction work items: throttles per user, retries
/// transient failures and records what could not be done.
#[derive(Clone)]
pub struct RecurringWorker {
    db: DatabaseConnection,
    throttle: UserThrottle,
    retry: RetryPolicy,
    failed: FailedJobs,
}

impl RecurringWorker {
    pub fn new(db: DatabaseConnection, settings: &JobSettings, failed: FailedJobs) -> Result<Self> {
        Ok(Self {
            db,
            throttle: UserThrottle::new(settings.throttle_limit, settings.throttle_period)?,
            retry: settings.retry,
            failed,
        })
    }

    pub fn failed_jobs(&self) -> &FailedJobs {
        &self.failed
    }

    /// Processes one item. Terminal failures are logged at ERROR and recorded
    /// before being returned.
    #[instrument(skip(self), fields(name = RECURRING_TRANSACTION_EVENT))]
    pub async fn handle(&self, event: RecurringTransactionEvent) -> Result<ProcessOutcome> {
        if let Err(e) = validate_event(&event) {
            error!("Rejected work item {:?}: {}", event, e);
            self.record_failure(event, &e).await;
            return Err(e);
        }

        self.throttle.acquire(event.user_id).await;

        let result = self
            .retry
            .run(|attempt| {
                if attempt > 0 {
                    debug!("Retry attempt {} for transaction {}", attempt, event.transaction_id);
                }
                process_recurring_transaction(&self.db, event, Utc::now())
            })
            .await;

        if let Err(e) = &result {
            error!(
                "Giving up on transaction {} for user {}: {}",
                event.transaction_id, event.user_id, e
            );
            self.record_failure(event, e).await;
        }
        result
    }

    async fn record_failure(&self, event: RecurringTransactionEvent, error: &JobError) {
        let attempts = match error {
            JobError::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        };
        self.failed
            .record(FailedJob {
                event,
                error: error.to_string(),
                attempts,
                failed_at: Utc::now(),
            })
            .await;
    }

    /// Drains the queue, one task per item, until every sender is dropped.
    /// Waits for in-flight items before returning.
    pub async fn run(self, mut receiver: mpsc::Receiver<RecurringTransactionEvent>) {
        info!("Recurring transaction worker started");
        let mut in_flight = JoinSet::new();

        while let Some(event) = receiver.recv().await {
            let worker = self.clone();
            in_flight.spawn(async move {
                let _ = worker.handle(event).await;
            });
            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}
        info!("Recurring transaction worker stopped");
    }
}
