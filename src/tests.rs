#[cfg(test)]
mod integration_tests {
    use crate::handlers::accounts::{AccountTypeDto, CreateAccountRequest};
    use crate::handlers::budgets::UpsertBudgetRequest;
    use crate::handlers::transactions::{
        BulkDeleteRequest, RecurringIntervalDto, TransactionRequest, TransactionStatusDto,
        TransactionTypeDto,
    };
    use crate::handlers::users::CreateUserRequest;
    use crate::schemas::{ApiResponse, ErrorResponse};
    use crate::test_utils::{setup_test_app, setup_test_app_with_state};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use std::str::FromStr;

    fn decimal(value: &Value) -> Decimal {
        match value {
            Value::String(s) => Decimal::from_str(s).unwrap(),
            other => Decimal::from_str(&other.to_string()).unwrap(),
        }
    }

    fn expense(account_id: i32, amount: i64, category: &str) -> TransactionRequest {
        TransactionRequest {
            account_id,
            transaction_type: TransactionTypeDto::Expense,
            amount: Decimal::new(amount, 0),
            description: None,
            date: Utc::now(),
            category: category.to_string(),
            is_recurring: false,
            recurring_interval: None,
            status: TransactionStatusDto::Completed,
        }
    }

    fn monthly_rent(account_id: i32) -> TransactionRequest {
        TransactionRequest {
            description: Some("Rent".to_string()),
            date: Utc::now() - Duration::days(40),
            is_recurring: true,
            recurring_interval: Some(RecurringIntervalDto::Monthly),
            ..expense(account_id, 1200, "housing")
        }
    }

    async fn open_account(server: &TestServer, user_id: i32, name: &str, is_default: bool) -> Value {
        let response = server
            .post(&format!("/api/v1/users/{}/accounts", user_id))
            .json(&CreateAccountRequest {
                name: name.to_string(),
                account_type: AccountTypeDto::Current,
                balance: None,
                is_default,
            })
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<ApiResponse<Value>>().data
    }

    async fn book(server: &TestServer, user_id: i32, request: &TransactionRequest) -> Value {
        let response = server
            .post(&format!("/api/v1/users/{}/transactions", user_id))
            .json(request)
            .await;
        if response.status_code() != StatusCode::CREATED {
            panic!("Expected 201 Created, got {}: {}", response.status_code(), response.text());
        }
        response.json::<ApiResponse<Value>>().data
    }

    async fn balance(server: &TestServer, user_id: i32, account_id: i64) -> Decimal {
        let response = server.get(&format!("/api/v1/users/{}/accounts", user_id)).await;
        response.assert_status_ok();
        let accounts = response.json::<ApiResponse<Vec<Value>>>().data;
        let account = accounts
            .iter()
            .find(|a| a["id"].as_i64() == Some(account_id))
            .expect("account listed");
        decimal(&account["balance"])
    }

    async fn list_transactions(server: &TestServer, user_id: i32) -> Vec<Value> {
        let response = server.get(&format!("/api/v1/users/{}/transactions", user_id)).await;
        response.assert_status_ok();
        response.json::<ApiResponse<Vec<Value>>>().data
    }

    /// The worker runs in the background: poll until it has booked enough rows.
    async fn wait_for_transactions(server: &TestServer, user_id: i32, expected: usize) -> Vec<Value> {
        for _ in 0..100 {
            let transactions = list_transactions(server, user_id).await;
            if transactions.len() >= expected {
                return transactions;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("worker did not book {} transactions in time", expected);
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server
            .post("/api/v1/users")
            .json(&CreateUserRequest {
                email: "carol@example.com".to_string(),
                name: Some("Carol".to_string()),
            })
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<Value> = response.json();
        assert!(body.success);
        assert_eq!(body.message, "User created successfully");
        assert_eq!(body.data["email"], "carol@example.com");

        let id = body.data["id"].as_i64().unwrap();
        let response = server.get(&format!("/api/v1/users/{}", id)).await;
        response.assert_status_ok();
        assert_eq!(response.json::<ApiResponse<Value>>().data["name"], "Carol");
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates_and_bad_email() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        // alice@example.com is seeded by the test state
        let response = server
            .post("/api/v1/users")
            .json(&CreateUserRequest {
                email: "alice@example.com".to_string(),
                name: None,
            })
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let error: ErrorResponse = response.json();
        assert_eq!(error.code, "EMAIL_ALREADY_EXISTS");
        assert!(!error.success);

        let response = server
            .post("/api/v1/users")
            .json(&CreateUserRequest {
                email: "not-an-email".to_string(),
                name: None,
            })
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_missing_user() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.get("/api/v1/users/999").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<ErrorResponse>().code, "USER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_default_account_moves_between_accounts() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let checking = open_account(&server, 1, "Checking", false).await;
        assert_eq!(checking["is_default"], true, "first account becomes the default");

        let savings = open_account(&server, 1, "Savings", false).await;
        assert_eq!(savings["is_default"], false);

        let response = server
            .put(&format!(
                "/api/v1/users/1/accounts/{}/default",
                savings["id"].as_i64().unwrap()
            ))
            .await;
        response.assert_status_ok();

        let response = server.get("/api/v1/users/1/accounts").await;
        let accounts = response.json::<ApiResponse<Vec<Value>>>().data;
        let defaults: Vec<&str> = accounts
            .iter()
            .filter(|a| a["is_default"] == true)
            .map(|a| a["name"].as_str().unwrap())
            .collect();
        assert_eq!(defaults, vec!["Savings"]);

        // Bob cannot touch Alice's account
        let response = server
            .put(&format!(
                "/api/v1/users/2/accounts/{}/default",
                checking["id"].as_i64().unwrap()
            ))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transaction_lifecycle_keeps_balance_in_step() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        let account = open_account(&server, 1, "Checking", true).await;
        let account_id = account["id"].as_i64().unwrap();

        let created = book(&server, 1, &expense(account_id as i32, 100, "groceries")).await;
        assert_eq!(balance(&server, 1, account_id).await, Decimal::new(-100, 0));
        let tx_id = created["id"].as_i64().unwrap();

        let response = server
            .put(&format!("/api/v1/users/1/transactions/{}", tx_id))
            .json(&expense(account_id as i32, 40, "groceries"))
            .await;
        response.assert_status_ok();
        assert_eq!(balance(&server, 1, account_id).await, Decimal::new(-40, 0));

        let response = server.get(&format!("/api/v1/users/1/transactions/{}", tx_id)).await;
        response.assert_status_ok();
        assert_eq!(decimal(&response.json::<ApiResponse<Value>>().data["amount"]), Decimal::new(40, 0));

        let response = server.delete(&format!("/api/v1/users/1/transactions/{}", tx_id)).await;
        response.assert_status_ok();
        assert_eq!(balance(&server, 1, account_id).await, Decimal::ZERO);

        let response = server.delete(&format!("/api/v1/users/1/transactions/{}", tx_id)).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transaction_validation() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        let account = open_account(&server, 1, "Checking", true).await;
        let account_id = account["id"].as_i64().unwrap() as i32;

        let mut request = expense(account_id, 10, "fees");
        request.is_recurring = true;
        let response = server.post("/api/v1/users/1/transactions").json(&request).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<ErrorResponse>().code, "VALIDATION_ERROR");

        let response = server
            .post("/api/v1/users/1/transactions")
            .json(&expense(account_id, -5, "fees"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/v1/users/1/transactions")
            .json(&expense(account_id, 10, ""))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // Someone else's account
        let response = server
            .post("/api/v1/users/2/transactions")
            .json(&expense(account_id, 10, "fees"))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(balance(&server, 1, account_id as i64).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_recurring_transaction_gets_next_date() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        let account = open_account(&server, 1, "Checking", true).await;

        let created = book(&server, 1, &monthly_rent(account["id"].as_i64().unwrap() as i32)).await;
        assert_eq!(created["is_recurring"], true);
        assert_eq!(created["recurring_interval"], "MONTHLY");
        assert!(created["next_recurring_date"].is_string());
        assert!(created["last_processed"].is_null());
    }

    #[tokio::test]
    async fn test_bulk_delete_reverses_every_balance() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        let checking = open_account(&server, 1, "Checking", true).await["id"].as_i64().unwrap();
        let savings = open_account(&server, 1, "Savings", false).await["id"].as_i64().unwrap();

        let mut ids = Vec::new();
        for (account_id, amount) in [(checking, 10), (checking, 20), (savings, 5)] {
            let tx = book(&server, 1, &expense(account_id as i32, amount, "misc")).await;
            ids.push(tx["id"].as_i64().unwrap() as i32);
        }
        let kept = book(&server, 1, &expense(checking as i32, 7, "misc")).await;

        let response = server
            .post("/api/v1/users/1/transactions/bulk-delete")
            .json(&BulkDeleteRequest { transaction_ids: ids })
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<ApiResponse<Value>>().data["deleted"], 3);

        assert_eq!(balance(&server, 1, checking).await, Decimal::new(-7, 0));
        assert_eq!(balance(&server, 1, savings).await, Decimal::ZERO);

        let remaining = list_transactions(&server, 1).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["id"], kept["id"]);
    }

    #[tokio::test]
    async fn test_budget_upsert_and_status() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        let account_id = open_account(&server, 1, "Checking", true).await["id"].as_i64().unwrap();

        let response = server
            .put("/api/v1/users/1/budget")
            .json(&UpsertBudgetRequest { amount: Decimal::new(-1, 0) })
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .put("/api/v1/users/1/budget")
            .json(&UpsertBudgetRequest { amount: Decimal::new(500, 0) })
            .await;
        response.assert_status_ok();

        book(&server, 1, &expense(account_id as i32, 450, "rent")).await;
        let mut income = expense(account_id as i32, 1000, "salary");
        income.transaction_type = TransactionTypeDto::Income;
        book(&server, 1, &income).await;

        let response = server
            .get(&format!("/api/v1/users/1/budget?account_id={}", account_id))
            .await;
        response.assert_status_ok();
        let status = response.json::<ApiResponse<Value>>().data;
        assert_eq!(decimal(&status["budget"]["amount"]), Decimal::new(500, 0));
        assert_eq!(decimal(&status["current_expenses"]), Decimal::new(450, 0));
        assert_eq!(decimal(&status["percentage_used"]), Decimal::new(90, 0));

        // Without a budget the status still reports spending
        let bob_account = open_account(&server, 2, "Checking", true).await["id"].as_i64().unwrap();
        let response = server
            .get(&format!("/api/v1/users/2/budget?account_id={}", bob_account))
            .await;
        let status = response.json::<ApiResponse<Value>>().data;
        assert!(status["budget"].is_null());
        assert!(status["percentage_used"].is_null());
    }

    #[tokio::test]
    async fn test_trigger_job_replays_due_transaction() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        let account_id = open_account(&server, 1, "Checking", true).await["id"].as_i64().unwrap();
        book(&server, 1, &monthly_rent(account_id as i32)).await;

        let response = server.post("/api/v1/jobs/trigger-recurring-transactions/run").await;
        response.assert_status_ok();
        let body = response.json::<ApiResponse<Value>>().data;
        assert_eq!(body["job"], "trigger-recurring-transactions");
        assert_eq!(body["summary"]["triggered"], 1);

        let transactions = wait_for_transactions(&server, 1, 2).await;
        let replay = transactions
            .iter()
            .find(|t| t["is_recurring"] == false)
            .expect("replay booked");
        assert_eq!(replay["description"], "Rent (Recurring)");
        assert_eq!(decimal(&replay["amount"]), Decimal::new(1200, 0));
        assert_eq!(balance(&server, 1, account_id).await, Decimal::new(-2400, 0));

        // The template is no longer due, so a second run finds nothing
        let response = server.post("/api/v1/jobs/trigger-recurring-transactions/run").await;
        assert_eq!(response.json::<ApiResponse<Value>>().data["summary"]["triggered"], 0);
    }

    #[tokio::test]
    async fn test_event_endpoint_queues_work() {
        let (app, state) = setup_test_app_with_state().await;
        let server = TestServer::new(app).unwrap();
        let account_id = open_account(&server, 1, "Checking", true).await["id"].as_i64().unwrap();
        let rent = book(&server, 1, &monthly_rent(account_id as i32)).await;

        let response = server
            .post("/api/v1/events/recurring-transaction")
            .json(&json!({ "transactionId": rent["id"], "userId": 1 }))
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        let accepted = response.json::<ApiResponse<Value>>().data;
        assert_eq!(accepted["name"], "transaction.recurring.process");

        wait_for_transactions(&server, 1, 2).await;
        assert_eq!(balance(&server, 1, account_id).await, Decimal::new(-2400, 0));
        assert!(state.failed_jobs.is_empty().await);

        let response = server.get("/api/v1/jobs/failed").await;
        response.assert_status_ok();
        assert_eq!(response.json::<ApiResponse<Vec<Value>>>().data.len(), 0);
    }

    #[tokio::test]
    async fn test_event_endpoint_rejects_malformed_items() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        for payload in [
            json!({ "userId": 1 }),
            json!({ "transactionId": "7", "userId": 1 }),
            json!({ "transactionId": 0, "userId": 1 }),
        ] {
            let response = server
                .post("/api/v1/events/recurring-transaction")
                .json(&payload)
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<ErrorResponse>().code, "INVALID_EVENT");
        }
    }

    #[tokio::test]
    async fn test_budget_alert_job_alerts_once() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        let account_id = open_account(&server, 1, "Checking", true).await["id"].as_i64().unwrap();
        server
            .put("/api/v1/users/1/budget")
            .json(&UpsertBudgetRequest { amount: Decimal::new(100, 0) })
            .await
            .assert_status_ok();
        book(&server, 1, &expense(account_id as i32, 85, "dining")).await;

        let response = server.post("/api/v1/jobs/check-budget-alerts/run").await;
        response.assert_status_ok();
        let summary = &response.json::<ApiResponse<Value>>().data["summary"];
        assert_eq!(summary["checked"], 1);
        assert_eq!(summary["alerts_sent"], 1);

        let response = server.get(&format!("/api/v1/users/1/budget?account_id={}", account_id)).await;
        assert!(response.json::<ApiResponse<Value>>().data["budget"]["last_alert_sent"].is_string());

        let response = server.post("/api/v1/jobs/check-budget-alerts/run").await;
        assert_eq!(response.json::<ApiResponse<Value>>().data["summary"]["alerts_sent"], 0);
    }

    #[tokio::test]
    async fn test_report_and_keepalive_jobs() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.post("/api/v1/jobs/generate-monthly-reports/run").await;
        response.assert_status_ok();
        let summary = &response.json::<ApiResponse<Value>>().data["summary"];
        assert_eq!(summary["processed"], 2);
        assert_eq!(summary["failed"], 0);

        let response = server.post("/api/v1/jobs/keepalive/run").await;
        response.assert_status_ok();
        let summary = &response.json::<ApiResponse<Value>>().data["summary"];
        assert_eq!(summary["status"], "ok");
        assert_eq!(summary["count"], 2);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let app = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.post("/api/v1/jobs/defragment/run").await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.json::<ErrorResponse>().code, "UNKNOWN_JOB");
    }
}
