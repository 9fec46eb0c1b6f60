use chrono::{DateTime, Utc};
use common::RecurringTransactionEvent;
use model::entities::transaction::{self, TransactionStatus};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait, sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{JobError, Result};
use crate::events::validate_event;
use crate::ledger::apply_balance_delta;
use crate::recurrence::{is_due, next_recurring_date};

/// Appended to the description of every replayed copy.
pub const REPLAY_SUFFIX: &str = " (Recurring)";

/// Why a work item finished without replaying anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No transaction with that id belongs to that user.
    NotFound,
    NotRecurring,
    NotDue,
    /// Another delivery of the same item claimed this cycle first.
    AlreadyProcessed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProcessOutcome {
    Replayed {
        replay_id: i32,
        next_recurring_date: DateTime<Utc>,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl ProcessOutcome {
    fn skipped(reason: SkipReason) -> Self {
        ProcessOutcome::Skipped { reason }
    }
}

/// Replays one due recurring transaction.
///
/// The replay row, the balance increment and the advance of the recurrence
/// dates commit together or not at all. The advance is claimed first with a
/// conditional update on the state read here, so a duplicate delivery racing
/// this one sees zero affected rows and rolls back as
/// [`SkipReason::AlreadyProcessed`].
#[instrument(skip(db), fields(transaction_id = event.transaction_id, user_id = event.user_id))]
pub async fn process_recurring_transaction(
    db: &DatabaseConnection,
    event: RecurringTransactionEvent,
    now: DateTime<Utc>,
) -> Result<ProcessOutcome> {
    validate_event(&event)?;

    let Some(template) = transaction::Entity::find_by_id(event.transaction_id)
        .filter(transaction::Column::UserId.eq(event.user_id))
        .one(db)
        .await?
    else {
        debug!("Transaction not found for user, skipping");
        return Ok(ProcessOutcome::skipped(SkipReason::NotFound));
    };

    let Some(interval) = template.recurring_interval.filter(|_| template.is_recurring) else {
        debug!("Transaction is not recurring, skipping");
        return Ok(ProcessOutcome::skipped(SkipReason::NotRecurring));
    };

    if !is_due(&template, now) {
        debug!(next_recurring_date = ?template.next_recurring_date, "Transaction not due yet");
        return Ok(ProcessOutcome::skipped(SkipReason::NotDue));
    }

    let next = next_recurring_date(now, interval)?;

    let outcome = db
        .transaction::<_, ProcessOutcome, JobError>(move |txn| {
            Box::pin(async move {
                let seen = match template.last_processed {
                    Some(last) => transaction::Column::LastProcessed.eq(last),
                    None => transaction::Column::LastProcessed.is_null(),
                };
                let claimed = transaction::Entity::update_many()
                    .col_expr(transaction::Column::LastProcessed, Expr::value(Some(now)))
                    .col_expr(transaction::Column::NextRecurringDate, Expr::value(Some(next)))
                    .col_expr(transaction::Column::UpdatedAt, Expr::value(now))
                    .filter(transaction::Column::Id.eq(template.id))
                    .filter(seen)
                    .filter(
                        Condition::any()
                            .add(transaction::Column::LastProcessed.is_null())
                            .add(transaction::Column::NextRecurringDate.is_null())
                            .add(transaction::Column::NextRecurringDate.lte(now)),
                    )
                    .exec(txn)
                    .await?;

                if claimed.rows_affected == 0 {
                    return Ok(ProcessOutcome::skipped(SkipReason::AlreadyProcessed));
                }

                let description = format!(
                    "{}{}",
                    template.description.as_deref().unwrap_or(&template.category),
                    REPLAY_SUFFIX
                );
                let replay = transaction::ActiveModel {
                    transaction_type: Set(template.transaction_type),
                    amount: Set(template.amount),
                    description: Set(Some(description)),
                    date: Set(now),
                    category: Set(template.category.clone()),
                    is_recurring: Set(false),
                    recurring_interval: Set(None),
                    next_recurring_date: Set(None),
                    last_processed: Set(None),
                    status: Set(TransactionStatus::Completed),
                    user_id: Set(template.user_id),
                    account_id: Set(template.account_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                apply_balance_delta(txn, template.account_id, template.signed_amount(), now).await?;

                Ok(ProcessOutcome::Replayed {
                    replay_id: replay.id,
                    next_recurring_date: next,
                })
            })
        })
        .await?;

    match &outcome {
        ProcessOutcome::Replayed { replay_id, next_recurring_date } => {
            info!(replay_id, %next_recurring_date, "Replayed recurring transaction");
        }
        ProcessOutcome::Skipped { reason } => {
            debug!(?reason, "Recurring transaction already claimed");
        }
    }
    Ok(outcome)
}
