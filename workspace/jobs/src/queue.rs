use async_trait::async_trait;
use common::{RECURRING_TRANSACTION_EVENT, RecurringTransactionEvent};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{JobError, Result};

/// Destination for recurring-transaction work items.
///
/// Delivery is at-least-once and unordered; consumers must tolerate duplicates.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn send_batch(&self, items: Vec<RecurringTransactionEvent>) -> Result<()>;

    async fn send(&self, item: RecurringTransactionEvent) -> Result<()> {
        self.send_batch(vec![item]).await
    }
}

/// In-process queue backed by a bounded tokio channel.
#[derive(Clone)]
pub struct ChannelQueue {
    sender: mpsc::Sender<RecurringTransactionEvent>,
}

impl ChannelQueue {
    /// Creates the queue and the receiving end the worker drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RecurringTransactionEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl WorkQueue for ChannelQueue {
    async fn send_batch(&self, items: Vec<RecurringTransactionEvent>) -> Result<()> {
        let count = items.len();
        for item in items {
            self.sender.send(item).await.map_err(|e| {
                JobError::Queue(format!("{} receiver dropped: {}", RECURRING_TRANSACTION_EVENT, e))
            })?;
        }
        debug!("Queued {} {} items", count, RECURRING_TRANSACTION_EVENT);
        Ok(())
    }
}
