use chrono::{DateTime, Duration, Months, Utc};
use model::entities::transaction::{self, RecurringInterval, TransactionStatus};

use crate::error::{JobError, Result};

/// Computes the next occurrence after `from` for the given interval.
///
/// Calendar intervals clamp to the end of the target month, so Jan 31 plus
/// one month is Feb 28 (or 29), and Feb 29 plus one year is Feb 28.
pub fn next_recurring_date(
    from: DateTime<Utc>,
    interval: RecurringInterval,
) -> Result<DateTime<Utc>> {
    let next = match interval {
        RecurringInterval::Daily => from.checked_add_signed(Duration::days(1)),
        RecurringInterval::Weekly => from.checked_add_signed(Duration::days(7)),
        RecurringInterval::Monthly => from.checked_add_months(Months::new(1)),
        RecurringInterval::Yearly => from.checked_add_months(Months::new(12)),
    };

    next.ok_or_else(|| {
        JobError::Validation(format!(
            "Next {:?} occurrence after {} is out of range",
            interval, from
        ))
    })
}

/// Whether a transaction should be replayed at `now`.
///
/// Only completed recurring transactions qualify. A transaction that has never
/// been processed is due immediately; otherwise it is due once
/// `next_recurring_date` has passed. A processed transaction without a next
/// date is treated as due so it cannot get stuck.
pub fn is_due(tx: &transaction::Model, now: DateTime<Utc>) -> bool {
    if !tx.is_recurring || tx.status != TransactionStatus::Completed {
        return false;
    }

    match (tx.last_processed, tx.next_recurring_date) {
        (None, _) => true,
        (Some(_), None) => true,
        (Some(_), Some(next)) => next <= now,
    }
}
