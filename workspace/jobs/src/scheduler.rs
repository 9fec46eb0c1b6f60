use chrono::{DateTime, Utc};
use common::{RecurringTransactionEvent, TriggerSummary};
use model::entities::transaction::{self, TransactionStatus};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::queue::WorkQueue;

/// Fans out every due recurring transaction as one work item.
///
/// Read-only: no transaction is modified here. If the query or the enqueue
/// fails the whole run fails, and the next tick selects the same rows again.
#[instrument(skip(db, queue))]
pub async fn trigger_recurring_transactions(
    db: &DatabaseConnection,
    queue: &dyn WorkQueue,
    now: DateTime<Utc>,
) -> Result<TriggerSummary> {
    let due: Vec<(i32, i32)> = transaction::Entity::find()
        .select_only()
        .column(transaction::Column::Id)
        .column(transaction::Column::UserId)
        .filter(transaction::Column::IsRecurring.eq(true))
        .filter(transaction::Column::Status.eq(TransactionStatus::Completed))
        .filter(
            Condition::any()
                .add(transaction::Column::LastProcessed.is_null())
                .add(transaction::Column::NextRecurringDate.is_null())
                .add(transaction::Column::NextRecurringDate.lte(now)),
        )
        .into_tuple()
        .all(db)
        .await
        .map_err(|e| {
            error!("Failed to fetch due recurring transactions: {}", e);
            e
        })?;

    let triggered = due.len();
    if triggered > 0 {
        let items = due
            .into_iter()
            .map(|(transaction_id, user_id)| RecurringTransactionEvent::new(transaction_id, user_id))
            .collect();
        queue.send_batch(items).await?;
    }

    info!("Triggered {} recurring transactions", triggered);
    Ok(TriggerSummary { triggered })
}
