//! Write paths for accounts, transactions and budgets.
//!
//! Every operation that books, changes or removes a transaction applies the
//! matching balance delta in the same database transaction, so an account's
//! balance always equals its opening balance plus the signed sum of its
//! transactions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use model::entities::{
    account::{self, AccountType},
    budget,
    transaction::{self, RecurringInterval, TransactionStatus, TransactionType},
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
    sea_query::Expr,
};
use tracing::{debug, info, instrument};

use crate::calendar::MonthRange;
use crate::error::{JobError, Result};
use crate::recurrence::next_recurring_date;
use crate::stats::account_expenses;

/// Adds `delta` to an account balance as a relative SQL increment.
///
/// Never read-modify-write: concurrent callers each add their own delta.
pub async fn apply_balance_delta<C>(
    conn: &C,
    account_id: i32,
    delta: Decimal,
    now: DateTime<Utc>,
) -> Result<()>
where
    C: ConnectionTrait,
{
    if delta.is_zero() {
        return Ok(());
    }

    let result = account::Entity::update_many()
        .col_expr(
            account::Column::Balance,
            Expr::col(account::Column::Balance).add(delta),
        )
        .col_expr(account::Column::UpdatedAt, Expr::value(now))
        .filter(account::Column::Id.eq(account_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(JobError::NotFound(format!("account {}", account_id)));
    }
    Ok(())
}

/// Fields accepted when booking or rewriting a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionInput {
    pub account_id: i32,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub category: String,
    pub is_recurring: bool,
    pub recurring_interval: Option<RecurringInterval>,
    pub status: TransactionStatus,
}

impl TransactionInput {
    fn validate(&self) -> Result<()> {
        if self.amount.is_sign_negative() {
            return Err(JobError::Validation("amount must not be negative".to_string()));
        }
        if self.category.trim().is_empty() {
            return Err(JobError::Validation("category is required".to_string()));
        }
        match (self.is_recurring, self.recurring_interval) {
            (true, None) => Err(JobError::Validation(
                "recurringInterval is required for recurring transactions".to_string(),
            )),
            (false, Some(_)) => Err(JobError::Validation(
                "recurringInterval is only allowed on recurring transactions".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn signed_amount(&self) -> Decimal {
        self.transaction_type.signed(self.amount)
    }

    fn next_recurring_date(&self) -> Result<Option<DateTime<Utc>>> {
        match self.recurring_interval.filter(|_| self.is_recurring) {
            Some(interval) => next_recurring_date(self.date, interval).map(Some),
            None => Ok(None),
        }
    }
}

/// Next occurrence after an edit. Once a transaction has been replayed its
/// schedule never moves back to or before `last_processed`.
fn rescheduled_next_date(
    original: &transaction::Model,
    input: &TransactionInput,
) -> Result<Option<DateTime<Utc>>> {
    let Some(interval) = input.recurring_interval.filter(|_| input.is_recurring) else {
        return Ok(None);
    };
    let Some(last_processed) = original.last_processed else {
        return input.next_recurring_date();
    };

    let schedule_unchanged = original.is_recurring
        && original.recurring_interval == Some(interval)
        && original.date == input.date;
    if schedule_unchanged {
        if let Some(next) = original.next_recurring_date.filter(|next| *next > last_processed) {
            return Ok(Some(next));
        }
    }

    next_recurring_date(input.date.max(last_processed), interval).map(Some)
}

async fn owned_account<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    account_id: i32,
) -> Result<account::Model> {
    account::Entity::find_by_id(account_id)
        .filter(account::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| JobError::NotFound(format!("account {}", account_id)))
}

async fn owned_transaction<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    transaction_id: i32,
) -> Result<transaction::Model> {
    transaction::Entity::find_by_id(transaction_id)
        .filter(transaction::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| JobError::NotFound(format!("transaction {}", transaction_id)))
}

/// Books a transaction and moves the account balance by its signed amount.
///
/// Recurring transactions get their first `next_recurring_date` from `date`
/// and stay unprocessed, so the next scheduler run picks them up.
#[instrument(skip(db, input), fields(account_id = input.account_id))]
pub async fn create_transaction(
    db: &DatabaseConnection,
    user_id: i32,
    input: TransactionInput,
    now: DateTime<Utc>,
) -> Result<transaction::Model> {
    input.validate()?;
    let next = input.next_recurring_date()?;

    let created = db
        .transaction::<_, transaction::Model, JobError>(move |txn| {
            Box::pin(async move {
                owned_account(txn, user_id, input.account_id).await?;

                let created = transaction::ActiveModel {
                    transaction_type: Set(input.transaction_type),
                    amount: Set(input.amount),
                    description: Set(input.description.clone()),
                    date: Set(input.date),
                    category: Set(input.category.clone()),
                    is_recurring: Set(input.is_recurring),
                    recurring_interval: Set(input.recurring_interval),
                    next_recurring_date: Set(next),
                    last_processed: Set(None),
                    status: Set(input.status),
                    user_id: Set(user_id),
                    account_id: Set(input.account_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(txn)
                .await?;

                apply_balance_delta(txn, input.account_id, input.signed_amount(), now).await?;
                Ok(created)
            })
        })
        .await?;

    info!("Created transaction {}", created.id);
    Ok(created)
}

/// Rewrites a transaction and rebalances the affected account(s).
///
/// On the same account the net delta `new - old` is applied. When the
/// transaction moves to another account, the old account gets the old delta
/// reversed and the new one gets the new delta.
#[instrument(skip(db, input))]
pub async fn update_transaction(
    db: &DatabaseConnection,
    user_id: i32,
    transaction_id: i32,
    input: TransactionInput,
    now: DateTime<Utc>,
) -> Result<transaction::Model> {
    input.validate()?;

    db.transaction::<_, transaction::Model, JobError>(move |txn| {
        Box::pin(async move {
            let original = owned_transaction(txn, user_id, transaction_id).await?;
            owned_account(txn, user_id, input.account_id).await?;
            let next = rescheduled_next_date(&original, &input)?;

            let old_delta = original.signed_amount();
            let new_delta = input.signed_amount();
            if original.account_id == input.account_id {
                apply_balance_delta(txn, input.account_id, new_delta - old_delta, now).await?;
            } else {
                apply_balance_delta(txn, original.account_id, -old_delta, now).await?;
                apply_balance_delta(txn, input.account_id, new_delta, now).await?;
            }

            let mut active = original.into_active_model();
            active.transaction_type = Set(input.transaction_type);
            active.amount = Set(input.amount);
            active.description = Set(input.description);
            active.date = Set(input.date);
            active.category = Set(input.category);
            active.is_recurring = Set(input.is_recurring);
            active.recurring_interval = Set(input.recurring_interval);
            active.next_recurring_date = Set(next);
            active.status = Set(input.status);
            active.account_id = Set(input.account_id);
            active.updated_at = Set(now);

            Ok(active.update(txn).await?)
        })
    })
    .await
    .map_err(JobError::from)
}

/// Deletes transactions owned by `user_id`, reversing their balance effects.
///
/// Ids that do not exist or belong to someone else are ignored. Returns the
/// number of rows removed.
#[instrument(skip(db))]
pub async fn delete_transactions(
    db: &DatabaseConnection,
    user_id: i32,
    transaction_ids: Vec<i32>,
    now: DateTime<Utc>,
) -> Result<u64> {
    if transaction_ids.is_empty() {
        return Ok(0);
    }

    db.transaction::<_, u64, JobError>(move |txn| {
        Box::pin(async move {
            let doomed = transaction::Entity::find()
                .filter(transaction::Column::Id.is_in(transaction_ids.clone()))
                .filter(transaction::Column::UserId.eq(user_id))
                .all(txn)
                .await?;

            let mut reversals: BTreeMap<i32, Decimal> = BTreeMap::new();
            for tx in &doomed {
                *reversals.entry(tx.account_id).or_insert(Decimal::ZERO) -= tx.signed_amount();
            }

            let deleted = transaction::Entity::delete_many()
                .filter(transaction::Column::Id.is_in(doomed.iter().map(|tx| tx.id)))
                .exec(txn)
                .await?;

            for (account_id, delta) in reversals {
                apply_balance_delta(txn, account_id, delta, now).await?;
            }

            debug!("Deleted {} transactions", deleted.rows_affected);
            Ok(deleted.rows_affected)
        })
    })
    .await
    .map_err(JobError::from)
}

pub async fn get_transaction(
    db: &DatabaseConnection,
    user_id: i32,
    transaction_id: i32,
) -> Result<transaction::Model> {
    owned_transaction(db, user_id, transaction_id).await
}

/// Transactions of a user, newest first, optionally limited to one account.
pub async fn list_transactions(
    db: &DatabaseConnection,
    user_id: i32,
    account_id: Option<i32>,
) -> Result<Vec<transaction::Model>> {
    let mut query = transaction::Entity::find().filter(transaction::Column::UserId.eq(user_id));
    if let Some(account_id) = account_id {
        query = query.filter(transaction::Column::AccountId.eq(account_id));
    }
    Ok(query
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await?)
}

/// Fields accepted when opening an account.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInput {
    pub name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub is_default: bool,
}

/// Opens an account. A user's first account always becomes the default.
#[instrument(skip(db, input))]
pub async fn create_account(
    db: &DatabaseConnection,
    user_id: i32,
    input: AccountInput,
    now: DateTime<Utc>,
) -> Result<account::Model> {
    if input.name.trim().is_empty() {
        return Err(JobError::Validation("account name is required".to_string()));
    }

    db.transaction::<_, account::Model, JobError>(move |txn| {
        Box::pin(async move {
            let existing = account::Entity::find()
                .filter(account::Column::UserId.eq(user_id))
                .count(txn)
                .await?;
            let is_default = existing == 0 || input.is_default;

            if is_default {
                clear_default(txn, user_id, now).await?;
            }

            Ok(account::ActiveModel {
                name: Set(input.name),
                account_type: Set(input.account_type),
                balance: Set(input.balance),
                is_default: Set(is_default),
                user_id: Set(user_id),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?)
        })
    })
    .await
    .map_err(JobError::from)
}

async fn clear_default<C: ConnectionTrait>(conn: &C, user_id: i32, now: DateTime<Utc>) -> Result<()> {
    account::Entity::update_many()
        .col_expr(account::Column::IsDefault, Expr::value(false))
        .col_expr(account::Column::UpdatedAt, Expr::value(now))
        .filter(account::Column::UserId.eq(user_id))
        .filter(account::Column::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

/// Makes `account_id` the user's only default account.
#[instrument(skip(db))]
pub async fn set_default_account(
    db: &DatabaseConnection,
    user_id: i32,
    account_id: i32,
    now: DateTime<Utc>,
) -> Result<account::Model> {
    db.transaction::<_, account::Model, JobError>(move |txn| {
        Box::pin(async move {
            let account = owned_account(txn, user_id, account_id).await?;
            clear_default(txn, user_id, now).await?;

            let mut active = account.into_active_model();
            active.is_default = Set(true);
            active.updated_at = Set(now);
            Ok(active.update(txn).await?)
        })
    })
    .await
    .map_err(JobError::from)
}

pub async fn list_accounts(db: &DatabaseConnection, user_id: i32) -> Result<Vec<account::Model>> {
    Ok(account::Entity::find()
        .filter(account::Column::UserId.eq(user_id))
        .order_by_asc(account::Column::Id)
        .all(db)
        .await?)
}

pub async fn get_account(
    db: &DatabaseConnection,
    user_id: i32,
    account_id: i32,
) -> Result<account::Model> {
    owned_account(db, user_id, account_id).await
}

/// Creates or replaces the user's single budget amount.
///
/// Changing the amount leaves `last_alert_sent` alone, so raising the budget
/// mid-month does not re-arm the alert until the next month.
#[instrument(skip(db))]
pub async fn upsert_budget(
    db: &DatabaseConnection,
    user_id: i32,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<budget::Model> {
    if amount.is_sign_negative() {
        return Err(JobError::Validation("budget amount must not be negative".to_string()));
    }

    let existing = budget::Entity::find()
        .filter(budget::Column::UserId.eq(user_id))
        .one(db)
        .await?;

    let saved = match existing {
        Some(found) => {
            let mut active = found.into_active_model();
            active.amount = Set(amount);
            active.updated_at = Set(now);
            active.update(db).await?
        }
        None => {
            budget::ActiveModel {
                user_id: Set(user_id),
                amount: Set(amount),
                last_alert_sent: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?
        }
    };
    Ok(saved)
}

/// The user's budget alongside this month's expenses on one account.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetStatus {
    pub budget: Option<budget::Model>,
    pub current_expenses: Decimal,
}

pub async fn current_budget(
    db: &DatabaseConnection,
    user_id: i32,
    account_id: i32,
    now: DateTime<Utc>,
) -> Result<BudgetStatus> {
    let budget = budget::Entity::find()
        .filter(budget::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    let range = MonthRange::containing(now)?;
    let current_expenses = account_expenses(db, user_id, account_id, range).await?;

    Ok(BudgetStatus {
        budget,
        current_expenses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{ProcessOutcome, process_recurring_transaction};
    use crate::recurrence::is_due;
    use crate::testing::*;
    use chrono::TimeZone;
    use common::RecurringTransactionEvent;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn expense(account_id: i32, amount: i64) -> TransactionInput {
        TransactionInput {
            account_id,
            transaction_type: TransactionType::Expense,
            amount: Decimal::new(amount, 0),
            description: Some("Groceries".to_string()),
            date: at(2025, 3, 10),
            category: "groceries".to_string(),
            is_recurring: false,
            recurring_interval: None,
            status: TransactionStatus::Completed,
        }
    }

    #[tokio::test]
    async fn test_create_update_delete_keep_balance_in_step() {
        let db = setup_db().await;
        let now = at(2025, 3, 10);
        let user = seed_user(&db, "alice@example.com", None).await;
        let checking = seed_account(&db, user.id, "Checking", Decimal::new(1000, 0), true).await;
        let savings = seed_account(&db, user.id, "Savings", Decimal::new(500, 0), false).await;

        let tx = create_transaction(&db, user.id, expense(checking.id, 100), now).await.unwrap();
        assert_eq!(balance_of(&db, checking.id).await, Decimal::new(900, 0));

        // Same account: net delta. Expense 100 becomes income 40 => +140
        let mut change = expense(checking.id, 40);
        change.transaction_type = TransactionType::Income;
        update_transaction(&db, user.id, tx.id, change, now).await.unwrap();
        assert_eq!(balance_of(&db, checking.id).await, Decimal::new(1040, 0));

        // Move to another account
        let updated = update_transaction(&db, user.id, tx.id, expense(savings.id, 60), now).await.unwrap();
        assert_eq!(updated.account_id, savings.id);
        assert_eq!(balance_of(&db, checking.id).await, Decimal::new(1000, 0));
        assert_eq!(balance_of(&db, savings.id).await, Decimal::new(440, 0));

        let deleted = delete_transactions(&db, user.id, vec![tx.id], now).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(balance_of(&db, savings.id).await, Decimal::new(500, 0));
    }

    #[tokio::test]
    async fn test_recurring_transaction_gets_next_date_from_its_date() {
        let db = setup_db().await;
        let user = seed_user(&db, "alice@example.com", None).await;
        let account = seed_account(&db, user.id, "Checking", Decimal::ZERO, true).await;

        let mut rent = expense(account.id, 1200);
        rent.is_recurring = true;
        rent.recurring_interval = Some(RecurringInterval::Monthly);
        rent.date = at(2025, 1, 31);

        let created = create_transaction(&db, user.id, rent, at(2025, 1, 31)).await.unwrap();
        assert_eq!(created.next_recurring_date, Some(at(2025, 2, 28)));
        assert_eq!(created.last_processed, None);
    }

    #[tokio::test]
    async fn test_editing_replayed_template_keeps_it_scheduled() {
        let db = setup_db().await;
        let user = seed_user(&db, "alice@example.com", None).await;
        let account = seed_account(&db, user.id, "Checking", Decimal::ZERO, true).await;

        let mut rent = expense(account.id, 100);
        rent.is_recurring = true;
        rent.recurring_interval = Some(RecurringInterval::Monthly);
        rent.date = at(2025, 1, 1);
        let template = create_transaction(&db, user.id, rent.clone(), at(2025, 1, 1)).await.unwrap();

        let event = RecurringTransactionEvent::new(template.id, user.id);
        let outcome = process_recurring_transaction(&db, event, at(2025, 3, 5)).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Replayed { .. }));
        assert_eq!(balance_of(&db, account.id).await, Decimal::new(-200, 0));

        // Description-only edit keeps the advanced schedule
        rent.description = Some("Flat rent".to_string());
        let edited = update_transaction(&db, user.id, template.id, rent.clone(), at(2025, 3, 6)).await.unwrap();
        assert_eq!(edited.last_processed, Some(at(2025, 3, 5)));
        assert_eq!(edited.next_recurring_date, Some(at(2025, 4, 5)));
        assert!(!is_due(&edited, at(2025, 3, 6)));

        let outcome = process_recurring_transaction(&db, event, at(2025, 3, 6)).await.unwrap();
        assert!(matches!(outcome, ProcessOutcome::Skipped { .. }));
        assert_eq!(balance_of(&db, account.id).await, Decimal::new(-200, 0));

        // A new interval is counted from the last replay, not the template date
        rent.recurring_interval = Some(RecurringInterval::Weekly);
        let edited = update_transaction(&db, user.id, template.id, rent, at(2025, 3, 6)).await.unwrap();
        assert_eq!(edited.next_recurring_date, Some(at(2025, 3, 12)));
    }

    #[tokio::test]
    async fn test_validation_and_ownership() {
        let db = setup_db().await;
        let now = at(2025, 3, 10);
        let alice = seed_user(&db, "alice@example.com", None).await;
        let bob = seed_user(&db, "bob@example.com", None).await;
        let account = seed_account(&db, alice.id, "Checking", Decimal::ZERO, true).await;

        let negative = expense(account.id, -5);
        assert!(matches!(
            create_transaction(&db, alice.id, negative, now).await,
            Err(JobError::Validation(_))
        ));

        let mut missing_interval = expense(account.id, 5);
        missing_interval.is_recurring = true;
        assert!(matches!(
            create_transaction(&db, alice.id, missing_interval, now).await,
            Err(JobError::Validation(_))
        ));

        assert!(matches!(
            create_transaction(&db, bob.id, expense(account.id, 5), now).await,
            Err(JobError::NotFound(_))
        ));

        // Bob cannot delete Alice's transaction
        let tx = create_transaction(&db, alice.id, expense(account.id, 5), now).await.unwrap();
        assert_eq!(delete_transactions(&db, bob.id, vec![tx.id], now).await.unwrap(), 0);
        assert_eq!(balance_of(&db, account.id).await, Decimal::new(-5, 0));
    }

    #[tokio::test]
    async fn test_first_account_becomes_default() {
        let db = setup_db().await;
        let now = at(2025, 3, 10);
        let user = seed_user(&db, "alice@example.com", None).await;
        let input = |name: &str, is_default| AccountInput {
            name: name.to_string(),
            account_type: AccountType::Current,
            balance: Decimal::ZERO,
            is_default,
        };

        let first = create_account(&db, user.id, input("First", false), now).await.unwrap();
        assert!(first.is_default);
        let second = create_account(&db, user.id, input("Second", false), now).await.unwrap();
        assert!(!second.is_default);
        let third = create_account(&db, user.id, input("Third", true), now).await.unwrap();
        assert!(third.is_default);

        set_default_account(&db, user.id, second.id, now).await.unwrap();
        let defaults: Vec<_> = list_accounts(&db, user.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .map(|a| a.id)
            .collect();
        assert_eq!(defaults, vec![second.id]);
    }

    #[tokio::test]
    async fn test_budget_upsert_and_current_expenses() {
        let db = setup_db().await;
        let now = at(2025, 3, 20);
        let user = seed_user(&db, "alice@example.com", None).await;
        let account = seed_account(&db, user.id, "Checking", Decimal::ZERO, true).await;

        insert_transaction(&db, &account, TransactionType::Expense, Decimal::new(150, 0), "food", at(2025, 3, 2)).await;
        insert_transaction(&db, &account, TransactionType::Expense, Decimal::new(50, 0), "food", at(2025, 2, 27)).await;
        insert_transaction(&db, &account, TransactionType::Income, Decimal::new(900, 0), "salary", at(2025, 3, 1)).await;

        let status = current_budget(&db, user.id, account.id, now).await.unwrap();
        assert!(status.budget.is_none());
        assert_eq!(status.current_expenses, Decimal::new(150, 0));

        let created = upsert_budget(&db, user.id, Decimal::new(400, 0), now).await.unwrap();
        let updated = upsert_budget(&db, user.id, Decimal::new(600, 0), now).await.unwrap();
        assert_eq!(created.id, updated.id);
        assert_eq!(updated.amount, Decimal::new(600, 0));

        assert!(matches!(
            upsert_budget(&db, user.id, Decimal::new(-1, 0), now).await,
            Err(JobError::Validation(_))
        ));
    }
}
