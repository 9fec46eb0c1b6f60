use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse, job_error};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use jobs::ledger::{self, AccountInput};
use model::entities::account::{self, AccountType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

/// Kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountTypeDto {
    Current,
    Savings,
}

impl From<AccountTypeDto> for AccountType {
    fn from(dto: AccountTypeDto) -> Self {
        match dto {
            AccountTypeDto::Current => AccountType::Current,
            AccountTypeDto::Savings => AccountType::Savings,
        }
    }
}

impl From<AccountType> for AccountTypeDto {
    fn from(model: AccountType) -> Self {
        match model {
            AccountType::Current => AccountTypeDto::Current,
            AccountType::Savings => AccountTypeDto::Savings,
        }
    }
}

/// Request body for opening an account
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateAccountRequest {
    /// Account name
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub account_type: AccountTypeDto,
    /// Opening balance (default: 0)
    #[schema(value_type = Option<String>)]
    pub balance: Option<Decimal>,
    /// Make this the default account. A user's first account always is.
    #[serde(default)]
    pub is_default: bool,
}

/// Account response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: i32,
    pub name: String,
    pub account_type: AccountTypeDto,
    #[schema(value_type = String)]
    pub balance: Decimal,
    pub is_default: bool,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<account::Model> for AccountResponse {
    fn from(model: account::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            account_type: model.account_type.into(),
            balance: model.balance,
            is_default: model.is_default,
            user_id: model.user_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Open a new account
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/accounts",
    tag = "accounts",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
    ),
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created successfully", body = ApiResponse<AccountResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_account(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<CreateAccountRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<AccountResponse>>), ApiError> {
    trace!("Entering create_account function");
    debug!("Creating account '{}' for user {}", request.name, user_id);

    let input = AccountInput {
        name: request.name,
        account_type: request.account_type.into(),
        balance: request.balance.unwrap_or(Decimal::ZERO),
        is_default: request.is_default,
    };

    let created = ledger::create_account(&state.db, user_id, input, Utc::now())
        .await
        .map_err(job_error)?;

    info!(
        "Account created successfully with ID: {}, default: {}",
        created.id, created.is_default
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AccountResponse::from(created), "Account created successfully")),
    ))
}

/// List a user's accounts
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/accounts",
    tag = "accounts",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
    ),
    responses(
        (status = 200, description = "Accounts retrieved successfully", body = ApiResponse<Vec<AccountResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_accounts(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<AccountResponse>>>, ApiError> {
    trace!("Entering get_accounts function");

    let accounts = ledger::list_accounts(&state.db, user_id)
        .await
        .map_err(job_error)?;
    debug!("Retrieved {} accounts for user {}", accounts.len(), user_id);

    Ok(Json(ApiResponse::ok(
        accounts.into_iter().map(AccountResponse::from).collect(),
        "Accounts retrieved successfully",
    )))
}

/// Make an account the user's default
///
/// Budget alerts are evaluated against the default account.
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/accounts/{account_id}/default",
    tag = "accounts",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
        ("account_id" = i32, Path, description = "Account ID"),
    ),
    responses(
        (status = 200, description = "Default account updated", body = ApiResponse<AccountResponse>),
        (status = 404, description = "Account not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn set_default_account(
    Path((user_id, account_id)): Path<(i32, i32)>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AccountResponse>>, ApiError> {
    trace!("Entering set_default_account function");

    let updated = ledger::set_default_account(&state.db, user_id, account_id, Utc::now())
        .await
        .map_err(job_error)?;

    info!("Account {} is now the default for user {}", updated.id, user_id);
    Ok(Json(ApiResponse::ok(
        AccountResponse::from(updated),
        "Default account updated successfully",
    )))
}
