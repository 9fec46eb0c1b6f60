use common::MonthlyStats;
use model::entities::transaction::{self, TransactionType};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use tracing::trace;

use crate::calendar::MonthRange;
use crate::error::Result;

/// Sum of EXPENSE amounts booked on one account within `range`.
///
/// Summed in Rust rather than with SQL `SUM` so that backends storing
/// decimals as floating point do not leak rounding into the result type.
pub async fn account_expenses<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    account_id: i32,
    range: MonthRange,
) -> Result<Decimal> {
    let amounts: Vec<Decimal> = transaction::Entity::find()
        .select_only()
        .column(transaction::Column::Amount)
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::AccountId.eq(account_id))
        .filter(transaction::Column::TransactionType.eq(TransactionType::Expense))
        .filter(transaction::Column::Date.gte(range.start))
        .filter(transaction::Column::Date.lt(range.end))
        .into_tuple()
        .all(conn)
        .await?;

    let total = amounts.into_iter().sum();
    trace!(user_id, account_id, %total, "Summed monthly expenses");
    Ok(total)
}

/// Income, expenses by category and transaction count for one user and month.
pub async fn monthly_stats<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    range: MonthRange,
) -> Result<MonthlyStats> {
    let rows: Vec<(TransactionType, Decimal, String)> = transaction::Entity::find()
        .select_only()
        .column(transaction::Column::TransactionType)
        .column(transaction::Column::Amount)
        .column(transaction::Column::Category)
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::Date.gte(range.start))
        .filter(transaction::Column::Date.lt(range.end))
        .into_tuple()
        .all(conn)
        .await?;

    let mut stats = MonthlyStats::default();
    for (transaction_type, amount, category) in rows {
        match transaction_type {
            TransactionType::Income => stats.record_income(amount),
            TransactionType::Expense => stats.record_expense(&category, amount),
        }
    }
    Ok(stats)
}
