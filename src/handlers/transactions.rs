use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse, job_error};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use jobs::ledger::{self, TransactionInput};
use model::entities::transaction::{self, RecurringInterval, TransactionStatus, TransactionType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionTypeDto {
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatusDto {
    Pending,
    #[default]
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurringIntervalDto {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl From<TransactionTypeDto> for TransactionType {
    fn from(dto: TransactionTypeDto) -> Self {
        match dto {
            TransactionTypeDto::Income => TransactionType::Income,
            TransactionTypeDto::Expense => TransactionType::Expense,
        }
    }
}

impl From<TransactionType> for TransactionTypeDto {
    fn from(model: TransactionType) -> Self {
        match model {
            TransactionType::Income => TransactionTypeDto::Income,
            TransactionType::Expense => TransactionTypeDto::Expense,
        }
    }
}

impl From<TransactionStatusDto> for TransactionStatus {
    fn from(dto: TransactionStatusDto) -> Self {
        match dto {
            TransactionStatusDto::Pending => TransactionStatus::Pending,
            TransactionStatusDto::Completed => TransactionStatus::Completed,
            TransactionStatusDto::Failed => TransactionStatus::Failed,
        }
    }
}

impl From<TransactionStatus> for TransactionStatusDto {
    fn from(model: TransactionStatus) -> Self {
        match model {
            TransactionStatus::Pending => TransactionStatusDto::Pending,
            TransactionStatus::Completed => TransactionStatusDto::Completed,
            TransactionStatus::Failed => TransactionStatusDto::Failed,
        }
    }
}

impl From<RecurringIntervalDto> for RecurringInterval {
    fn from(dto: RecurringIntervalDto) -> Self {
        match dto {
            RecurringIntervalDto::Daily => RecurringInterval::Daily,
            RecurringIntervalDto::Weekly => RecurringInterval::Weekly,
            RecurringIntervalDto::Monthly => RecurringInterval::Monthly,
            RecurringIntervalDto::Yearly => RecurringInterval::Yearly,
        }
    }
}

impl From<RecurringInterval> for RecurringIntervalDto {
    fn from(model: RecurringInterval) -> Self {
        match model {
            RecurringInterval::Daily => RecurringIntervalDto::Daily,
            RecurringInterval::Weekly => RecurringIntervalDto::Weekly,
            RecurringInterval::Monthly => RecurringIntervalDto::Monthly,
            RecurringInterval::Yearly => RecurringIntervalDto::Yearly,
        }
    }
}

/// Request body for booking or editing a transaction
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct TransactionRequest {
    /// Account the transaction is booked on
    pub account_id: i32,
    pub transaction_type: TransactionTypeDto,
    /// Non-negative amount; the sign comes from `transaction_type`
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    /// When the transaction takes effect
    pub date: DateTime<Utc>,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[serde(default)]
    pub is_recurring: bool,
    /// Required when `is_recurring` is set
    pub recurring_interval: Option<RecurringIntervalDto>,
    /// Default: COMPLETED
    #[serde(default)]
    pub status: TransactionStatusDto,
}

impl From<TransactionRequest> for TransactionInput {
    fn from(request: TransactionRequest) -> Self {
        Self {
            account_id: request.account_id,
            transaction_type: request.transaction_type.into(),
            amount: request.amount,
            description: request.description,
            date: request.date,
            category: request.category,
            is_recurring: request.is_recurring,
            recurring_interval: request.recurring_interval.map(Into::into),
            status: request.status.into(),
        }
    }
}

/// Transaction response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: i32,
    pub account_id: i32,
    pub user_id: i32,
    pub transaction_type: TransactionTypeDto,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub category: String,
    pub is_recurring: bool,
    pub recurring_interval: Option<RecurringIntervalDto>,
    pub next_recurring_date: Option<DateTime<Utc>>,
    pub last_processed: Option<DateTime<Utc>>,
    pub status: TransactionStatusDto,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<transaction::Model> for TransactionResponse {
    fn from(model: transaction::Model) -> Self {
        Self {
            id: model.id,
            account_id: model.account_id,
            user_id: model.user_id,
            transaction_type: model.transaction_type.into(),
            amount: model.amount,
            description: model.description,
            date: model.date,
            category: model.category,
            is_recurring: model.is_recurring,
            recurring_interval: model.recurring_interval.map(Into::into),
            next_recurring_date: model.next_recurring_date,
            last_processed: model.last_processed,
            status: model.status.into(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Query parameters for listing transactions
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct TransactionListQuery {
    /// Only transactions booked on this account
    pub account_id: Option<i32>,
}

/// Request body for deleting several transactions at once
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1, max = 1000))]
    pub transaction_ids: Vec<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedResponse {
    pub deleted: u64,
}

/// Book a transaction and adjust the account balance
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/transactions",
    tag = "transactions",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
    ),
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction created successfully", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_transaction(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<TransactionRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResponse>>), ApiError> {
    trace!("Entering create_transaction function");
    debug!(
        "Booking {:?} of {} on account {} for user {}",
        request.transaction_type, request.amount, request.account_id, user_id
    );

    let created = ledger::create_transaction(&state.db, user_id, request.into(), Utc::now())
        .await
        .map_err(job_error)?;

    info!("Transaction created successfully with ID: {}", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            TransactionResponse::from(created),
            "Transaction created successfully",
        )),
    ))
}

/// List a user's transactions, newest first
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/transactions",
    tag = "transactions",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
        TransactionListQuery,
    ),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = ApiResponse<Vec<TransactionResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transactions(
    Path(user_id): Path<i32>,
    Query(query): Query<TransactionListQuery>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, ApiError> {
    trace!("Entering get_transactions function");

    let transactions = ledger::list_transactions(&state.db, user_id, query.account_id)
        .await
        .map_err(job_error)?;
    debug!("Retrieved {} transactions for user {}", transactions.len(), user_id);

    Ok(Json(ApiResponse::ok(
        transactions.into_iter().map(TransactionResponse::from).collect(),
        "Transactions retrieved successfully",
    )))
}

/// Get a single transaction
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/transactions/{transaction_id}",
    tag = "transactions",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
        ("transaction_id" = i32, Path, description = "Transaction ID"),
    ),
    responses(
        (status = 200, description = "Transaction retrieved successfully", body = ApiResponse<TransactionResponse>),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transaction(
    Path((user_id, transaction_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    trace!("Entering get_transaction function");

    let found = ledger::get_transaction(&state.db, user_id, transaction_id)
        .await
        .map_err(job_error)?;

    Ok(Json(ApiResponse::ok(
        TransactionResponse::from(found),
        "Transaction retrieved successfully",
    )))
}

/// Edit a transaction, moving the balance by the difference
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/transactions/{transaction_id}",
    tag = "transactions",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
        ("transaction_id" = i32, Path, description = "Transaction ID"),
    ),
    request_body = TransactionRequest,
    responses(
        (status = 200, description = "Transaction updated successfully", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Transaction or account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_transaction(
    Path((user_id, transaction_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<TransactionRequest>>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    trace!("Entering update_transaction function");

    let updated =
        ledger::update_transaction(&state.db, user_id, transaction_id, request.into(), Utc::now())
            .await
            .map_err(job_error)?;

    info!("Transaction {} updated successfully", updated.id);
    Ok(Json(ApiResponse::ok(
        TransactionResponse::from(updated),
        "Transaction updated successfully",
    )))
}

/// Delete a transaction and reverse its effect on the balance
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}/transactions/{transaction_id}",
    tag = "transactions",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
        ("transaction_id" = i32, Path, description = "Transaction ID"),
    ),
    responses(
        (status = 200, description = "Transaction deleted successfully", body = ApiResponse<DeletedResponse>),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_transaction(
    Path((user_id, transaction_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    trace!("Entering delete_transaction function");

    let deleted = ledger::delete_transactions(&state.db, user_id, vec![transaction_id], Utc::now())
        .await
        .map_err(job_error)?;

    if deleted == 0 {
        return Err(ErrorResponse::new(
            StatusCode::NOT_FOUND,
            "TRANSACTION_NOT_FOUND",
            format!("Transaction with id {} does not exist", transaction_id),
        ));
    }

    info!("Transaction {} deleted successfully", transaction_id);
    Ok(Json(ApiResponse::ok(
        DeletedResponse { deleted },
        "Transaction deleted successfully",
    )))
}

/// Delete several transactions in one database transaction
///
/// Ids that do not exist or belong to another user are ignored.
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/transactions/bulk-delete",
    tag = "transactions",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
    ),
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Transactions deleted successfully", body = ApiResponse<DeletedResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn bulk_delete_transactions(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<BulkDeleteRequest>>,
) -> Result<Json<ApiResponse<DeletedResponse>>, ApiError> {
    trace!("Entering bulk_delete_transactions function");

    let deleted =
        ledger::delete_transactions(&state.db, user_id, request.transaction_ids, Utc::now())
            .await
            .map_err(job_error)?;

    info!("Deleted {} transactions for user {}", deleted, user_id);
    Ok(Json(ApiResponse::ok(
        DeletedResponse { deleted },
        "Transactions deleted successfully",
    )))
}
