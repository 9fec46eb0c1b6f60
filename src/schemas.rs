use axum::{http::StatusCode, response::Json};
use common::{
    BudgetAlertSummary, KeepaliveStatus, RecurringTransactionEvent, ReportSummary, TriggerSummary,
};
use jobs::worker::FailedJobs;
use jobs::{JobContext, JobError};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::handlers::{
    accounts::{AccountResponse, AccountTypeDto, CreateAccountRequest},
    budgets::{BudgetResponse, BudgetStatusResponse, UpsertBudgetRequest},
    job_runs::{EventAccepted, FailedJobResponse, JobRunResponse},
    transactions::{
        BulkDeleteRequest, DeletedResponse, RecurringIntervalDto, TransactionRequest,
        TransactionResponse, TransactionStatusDto, TransactionTypeDto,
    },
    users::{CreateUserRequest, UserResponse},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Periodic jobs and the recurring-transaction queue
    pub jobs: JobContext,
    /// Work items the worker gave up on
    pub failed_jobs: FailedJobs,
}

/// API response wrapper
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// What handlers return on failure.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

impl ErrorResponse {
    pub fn new(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
        (
            status,
            Json(ErrorResponse {
                error: error.into(),
                code: code.to_string(),
                success: false,
            }),
        )
    }
}

/// Maps a pipeline error onto a status code and error code. Server-side
/// failures are logged and their details withheld from the client.
pub fn job_error(e: JobError) -> ApiError {
    match e {
        JobError::NotFound(what) => {
            ErrorResponse::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{} not found", what))
        }
        JobError::Validation(msg) => {
            ErrorResponse::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
        }
        JobError::InvalidEvent(msg) => {
            ErrorResponse::new(StatusCode::BAD_REQUEST, "INVALID_EVENT", msg)
        }
        JobError::Queue(msg) => {
            error!("Queue unavailable: {}", msg);
            ErrorResponse::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "QUEUE_UNAVAILABLE",
                "Work queue is not accepting items",
            )
        }
        JobError::Database(db_err) => {
            error!("Database error: {}", db_err);
            ErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "Database operation failed",
            )
        }
        other => {
            error!("Request failed: {}", other);
            ErrorResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                other.to_string(),
            )
        }
    }
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::accounts::create_account,
        crate::handlers::accounts::get_accounts,
        crate::handlers::accounts::set_default_account,
        crate::handlers::transactions::create_transaction,
        crate::handlers::transactions::get_transactions,
        crate::handlers::transactions::get_transaction,
        crate::handlers::transactions::update_transaction,
        crate::handlers::transactions::delete_transaction,
        crate::handlers::transactions::bulk_delete_transactions,
        crate::handlers::budgets::upsert_budget,
        crate::handlers::budgets::get_current_budget,
        crate::handlers::job_runs::enqueue_recurring_transaction,
        crate::handlers::job_runs::run_job,
        crate::handlers::job_runs::get_failed_jobs,
    ),
    components(
        schemas(
            ApiResponse<UserResponse>,
            ApiResponse<AccountResponse>,
            ApiResponse<Vec<AccountResponse>>,
            ApiResponse<TransactionResponse>,
            ApiResponse<Vec<TransactionResponse>>,
            ApiResponse<DeletedResponse>,
            ApiResponse<BudgetResponse>,
            ApiResponse<BudgetStatusResponse>,
            ApiResponse<EventAccepted>,
            ApiResponse<JobRunResponse>,
            ApiResponse<Vec<FailedJobResponse>>,
            ErrorResponse,
            HealthResponse,
            CreateUserRequest,
            UserResponse,
            CreateAccountRequest,
            AccountResponse,
            AccountTypeDto,
            TransactionRequest,
            TransactionResponse,
            TransactionTypeDto,
            TransactionStatusDto,
            RecurringIntervalDto,
            BulkDeleteRequest,
            DeletedResponse,
            UpsertBudgetRequest,
            BudgetResponse,
            BudgetStatusResponse,
            RecurringTransactionEvent,
            EventAccepted,
            JobRunResponse,
            FailedJobResponse,
            TriggerSummary,
            BudgetAlertSummary,
            ReportSummary,
            KeepaliveStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User management endpoints"),
        (name = "accounts", description = "Account management endpoints"),
        (name = "transactions", description = "Transaction ledger endpoints"),
        (name = "budgets", description = "Monthly budget endpoints"),
        (name = "jobs", description = "Background job and work queue endpoints"),
    ),
    info(
        title = "FinFlow API",
        description = "Personal finance backend with recurring transactions, budget alerts and monthly reports",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
