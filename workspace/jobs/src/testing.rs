//! Fixtures and recording doubles shared by the job tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::RecurringTransactionEvent;
use migration::{Migrator, MigratorTrait};
use model::entities::{account, budget, transaction, user};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Set};
use transaction::{RecurringInterval, TransactionStatus, TransactionType};

use crate::error::{JobError, Result};
use crate::insight::InsightGenerator;
use crate::notify::{Notification, NotificationDispatcher};
use crate::queue::WorkQueue;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn setup_db() -> DatabaseConnection {
    init_tracing();
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.execute_unprepared("PRAGMA foreign_keys = ON;").await.unwrap();
    Migrator::up(&db, None).await.expect("Migrations failed.");
    db
}

pub async fn seed_user(db: &DatabaseConnection, email: &str, name: Option<&str>) -> user::Model {
    user::ActiveModel {
        email: Set(email.to_string()),
        name: Set(name.map(str::to_string)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_account(
    db: &DatabaseConnection,
    user_id: i32,
    name: &str,
    balance: Decimal,
    is_default: bool,
) -> account::Model {
    let now = Utc::now();
    account::ActiveModel {
        name: Set(name.to_string()),
        account_type: Set(account::AccountType::Current),
        balance: Set(balance),
        is_default: Set(is_default),
        user_id: Set(user_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Inserts a row directly, without touching the account balance.
pub async fn insert_transaction(
    db: &DatabaseConnection,
    account: &account::Model,
    transaction_type: TransactionType,
    amount: Decimal,
    category: &str,
    date: DateTime<Utc>,
) -> transaction::Model {
    transaction::ActiveModel {
        transaction_type: Set(transaction_type),
        amount: Set(amount),
        description: Set(Some(format!("{} payment", category))),
        date: Set(date),
        category: Set(category.to_string()),
        is_recurring: Set(false),
        recurring_interval: Set(None),
        next_recurring_date: Set(None),
        last_processed: Set(None),
        status: Set(TransactionStatus::Completed),
        user_id: Set(account.user_id),
        account_id: Set(account.id),
        created_at: Set(date),
        updated_at: Set(date),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// Inserts a completed recurring template with the given processing state.
#[allow(clippy::too_many_arguments)]
pub async fn insert_recurring(
    db: &DatabaseConnection,
    account: &account::Model,
    transaction_type: TransactionType,
    amount: Decimal,
    interval: RecurringInterval,
    date: DateTime<Utc>,
    last_processed: Option<DateTime<Utc>>,
    next_recurring_date: Option<DateTime<Utc>>,
) -> transaction::Model {
    transaction::ActiveModel {
        transaction_type: Set(transaction_type),
        amount: Set(amount),
        description: Set(Some("Rent".to_string())),
        date: Set(date),
        category: Set("housing".to_string()),
        is_recurring: Set(true),
        recurring_interval: Set(Some(interval)),
        next_recurring_date: Set(next_recurring_date),
        last_processed: Set(last_processed),
        status: Set(TransactionStatus::Completed),
        user_id: Set(account.user_id),
        account_id: Set(account.id),
        created_at: Set(date),
        updated_at: Set(date),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_budget(
    db: &DatabaseConnection,
    user_id: i32,
    amount: Decimal,
    last_alert_sent: Option<DateTime<Utc>>,
) -> budget::Model {
    let now = Utc::now();
    budget::ActiveModel {
        user_id: Set(user_id),
        amount: Set(amount),
        last_alert_sent: Set(last_alert_sent),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn balance_of(db: &DatabaseConnection, account_id: i32) -> Decimal {
    account::Entity::find_by_id(account_id)
        .one(db)
        .await
        .unwrap()
        .expect("account exists")
        .balance
}

#[derive(Default)]
pub struct RecordingQueue {
    pub items: Mutex<Vec<RecurringTransactionEvent>>,
    pub batches: Mutex<usize>,
}

#[async_trait]
impl WorkQueue for RecordingQueue {
    async fn send_batch(&self, items: Vec<RecurringTransactionEvent>) -> Result<()> {
        *self.batches.lock().unwrap() += 1;
        self.items.lock().unwrap().extend(items);
        Ok(())
    }
}

/// Records every notification. Fails for `fail_for` if set.
#[derive(Default)]
pub struct RecordingDispatcher {
    pub sent: Mutex<Vec<Notification>>,
    pub fail_for: Option<String>,
}

impl RecordingDispatcher {
    pub fn failing_for(address: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_for: Some(address.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        if self.fail_for.as_deref() == Some(notification.to.as_str()) {
            return Err(JobError::Dispatch(format!("mailbox {} unavailable", notification.to)));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Returns `response` for every prompt, except prompts containing `fail_marker`.
pub struct StubInsightGenerator {
    pub response: String,
    pub fail_marker: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl StubInsightGenerator {
    pub fn replying(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fail_marker: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_when(response: &str, marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Self::replying(response)
        }
    }
}

#[async_trait]
impl InsightGenerator for StubInsightGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(marker) = &self.fail_marker {
            if prompt.contains(marker.as_str()) {
                return Err(JobError::Insight("model overloaded".to_string()));
            }
        }
        Ok(self.response.clone())
    }
}
