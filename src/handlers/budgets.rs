use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse, job_error};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use jobs::budget_alert::percentage_used;
use jobs::ledger;
use model::entities::budget;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};

/// Request body for setting the monthly budget
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpsertBudgetRequest {
    /// Monthly spending limit, must not be negative
    #[schema(value_type = String)]
    pub amount: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BudgetResponse {
    pub id: i32,
    pub user_id: i32,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub last_alert_sent: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<budget::Model> for BudgetResponse {
    fn from(model: budget::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            amount: model.amount,
            last_alert_sent: model.last_alert_sent,
            updated_at: model.updated_at,
        }
    }
}

/// The budget next to this month's spending on one account
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BudgetStatusResponse {
    pub budget: Option<BudgetResponse>,
    pub account_id: i32,
    /// Expenses booked on the account since the start of the month
    #[schema(value_type = String)]
    pub current_expenses: Decimal,
    /// Share of the budget used so far; absent without a positive budget
    #[schema(value_type = Option<String>)]
    pub percentage_used: Option<Decimal>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct BudgetQuery {
    /// Account whose spending is compared to the budget
    pub account_id: i32,
}

/// Create or replace the user's monthly budget
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/budget",
    tag = "budgets",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
    ),
    request_body = UpsertBudgetRequest,
    responses(
        (status = 200, description = "Budget saved", body = ApiResponse<BudgetResponse>),
        (status = 400, description = "Negative amount", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn upsert_budget(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Json(request): Json<UpsertBudgetRequest>,
) -> Result<Json<ApiResponse<BudgetResponse>>, ApiError> {
    trace!("Entering upsert_budget function");

    let saved = ledger::upsert_budget(&state.db, user_id, request.amount, Utc::now())
        .await
        .map_err(job_error)?;

    info!("Budget for user {} set to {}", user_id, saved.amount);
    Ok(Json(ApiResponse::ok(BudgetResponse::from(saved), "Budget saved successfully")))
}

/// Current budget and month-to-date expenses on an account
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}/budget",
    tag = "budgets",
    params(
        ("user_id" = i32, Path, description = "Owner user ID"),
        BudgetQuery,
    ),
    responses(
        (status = 200, description = "Budget status retrieved", body = ApiResponse<BudgetStatusResponse>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_current_budget(
    Path(user_id): Path<i32>,
    Query(query): Query<BudgetQuery>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<BudgetStatusResponse>>, ApiError> {
    trace!("Entering get_current_budget function");

    let status = ledger::current_budget(&state.db, user_id, query.account_id, Utc::now())
        .await
        .map_err(job_error)?;
    let percentage = status
        .budget
        .as_ref()
        .and_then(|b| percentage_used(status.current_expenses, b.amount));
    debug!(
        "User {} spent {} this month on account {}",
        user_id, status.current_expenses, query.account_id
    );

    Ok(Json(ApiResponse::ok(
        BudgetStatusResponse {
            budget: status.budget.map(BudgetResponse::from),
            account_id: query.account_id,
            current_expenses: status.current_expenses,
            percentage_used: percentage,
        },
        "Budget status retrieved successfully",
    )))
}
