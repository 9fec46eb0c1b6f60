pub mod entities;

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use migration::{Migrator, MigratorTrait};
    use rust_decimal::Decimal;
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, ModelTrait, QueryFilter, Set,
    };

    use super::entities::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        // Connect to the SQLite database
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();

        let user1 = user::ActiveModel {
            email: Set("alice@example.com".to_string()),
            name: Set(Some("Alice".to_string())),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let user2 = user::ActiveModel {
            email: Set("bob@example.com".to_string()),
            name: Set(None),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let checking = account::ActiveModel {
            name: Set("Checking".to_string()),
            account_type: Set(account::AccountType::Current),
            balance: Set(Decimal::new(100000, 2)), // 1000.00
            is_default: Set(true),
            user_id: Set(user1.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let savings = account::ActiveModel {
            name: Set("Savings".to_string()),
            account_type: Set(account::AccountType::Savings),
            balance: Set(Decimal::ZERO),
            is_default: Set(false),
            user_id: Set(user1.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let rent = transaction::ActiveModel {
            transaction_type: Set(transaction::TransactionType::Expense),
            amount: Set(Decimal::new(120000, 2)), // 1200.00
            description: Set(Some("Rent".to_string())),
            date: Set(now),
            category: Set("housing".to_string()),
            is_recurring: Set(true),
            recurring_interval: Set(Some(transaction::RecurringInterval::Monthly)),
            next_recurring_date: Set(Some(Utc.with_ymd_and_hms(2025, 2, 15, 12, 0, 0).unwrap())),
            last_processed: Set(None),
            status: Set(transaction::TransactionStatus::Completed),
            user_id: Set(user1.id),
            account_id: Set(checking.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let budget = budget::ActiveModel {
            user_id: Set(user1.id),
            amount: Set(Decimal::new(200000, 2)),
            last_alert_sent: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        // Read back and verify data
        let users = User::find().all(&db).await?;
        assert_eq!(users.len(), 2);
        assert_eq!(user1.display_name(), "Alice");
        assert_eq!(user2.display_name(), "bob@example.com");

        let accounts = Account::find()
            .filter(account::Column::UserId.eq(user1.id))
            .all(&db)
            .await?;
        assert_eq!(accounts.len(), 2);
        assert!(accounts.iter().any(|a| a.id == savings.id && !a.is_default));

        let stored = Transaction::find_by_id(rent.id).one(&db).await?.unwrap();
        assert_eq!(stored.transaction_type, transaction::TransactionType::Expense);
        assert_eq!(stored.recurring_interval, Some(transaction::RecurringInterval::Monthly));
        assert_eq!(stored.signed_amount(), Decimal::new(-120000, 2));
        assert_eq!(stored.last_processed, None);

        // Relations
        let owner_budget = user1.find_related(Budget).one(&db).await?.unwrap();
        assert_eq!(owner_budget.id, budget.id);

        let checking_txs = checking.find_related(Transaction).all(&db).await?;
        assert_eq!(checking_txs.len(), 1);
        assert_eq!(checking_txs[0].id, rent.id);

        // Deleting the user cascades to everything it owns
        user1.delete(&db).await?;
        assert!(Transaction::find().all(&db).await?.is_empty());
        assert!(Budget::find().all(&db).await?.is_empty());
        assert_eq!(Account::find().all(&db).await?.len(), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_money_columns_keep_four_decimal_places() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();

        let owner = user::ActiveModel {
            email: Set("cents@example.com".to_string()),
            name: Set(None),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let account = account::ActiveModel {
            name: Set("Checking".to_string()),
            account_type: Set(account::AccountType::Current),
            balance: Set(Decimal::new(12_345_678, 4)),
            is_default: Set(true),
            user_id: Set(owner.id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let stored = Account::find_by_id(account.id).one(&db).await?.unwrap();
        assert_eq!(stored.balance, Decimal::new(12_345_678, 4));

        Ok(())
    }

    #[test]
    fn test_signed_amount() {
        let amount = Decimal::new(4250, 2);
        assert_eq!(transaction::TransactionType::Income.signed(amount), amount);
        assert_eq!(transaction::TransactionType::Expense.signed(amount), -amount);
    }
}
