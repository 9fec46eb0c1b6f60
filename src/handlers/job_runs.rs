use crate::schemas::{ApiError, ApiResponse, AppState, ErrorResponse, job_error};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use common::{RECURRING_TRANSACTION_EVENT, RecurringTransactionEvent};
use jobs::JobKind;
use jobs::events::parse_event;
use jobs::worker::FailedJob;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;

/// Acknowledgement for a queued work item
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventAccepted {
    /// Event name the item was queued under
    pub name: String,
    pub transaction_id: i32,
    pub user_id: i32,
}

/// Outcome of an on-demand job run
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobRunResponse {
    pub job: String,
    /// One of the job summaries, depending on the job
    #[schema(value_type = Object)]
    pub summary: Value,
}

/// A recurring-transaction work item the worker gave up on
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FailedJobResponse {
    pub event: RecurringTransactionEvent,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

impl From<FailedJob> for FailedJobResponse {
    fn from(job: FailedJob) -> Self {
        Self {
            event: job.event,
            error: job.error,
            attempts: job.attempts,
            failed_at: job.failed_at,
        }
    }
}

/// Queue one recurring transaction for processing
///
/// Processing is asynchronous and idempotent: a transaction that is not due
/// when the worker picks the item up is skipped.
#[utoipa::path(
    post,
    path = "/api/v1/events/recurring-transaction",
    tag = "jobs",
    request_body = RecurringTransactionEvent,
    responses(
        (status = 202, description = "Work item queued", body = ApiResponse<EventAccepted>),
        (status = 400, description = "Malformed work item", body = ErrorResponse),
        (status = 503, description = "Queue unavailable", body = ErrorResponse)
    )
)]
#[instrument(skip(state, payload))]
pub async fn enqueue_recurring_transaction(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<ApiResponse<EventAccepted>>), ApiError> {
    trace!("Entering enqueue_recurring_transaction function");

    let event = parse_event(&payload).map_err(|e| {
        warn!("Rejected {} payload {}: {}", RECURRING_TRANSACTION_EVENT, payload, e);
        job_error(e)
    })?;

    state.jobs.queue.send(event).await.map_err(job_error)?;
    debug!(
        "Queued transaction {} for user {}",
        event.transaction_id, event.user_id
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(
            EventAccepted {
                name: RECURRING_TRANSACTION_EVENT.to_string(),
                transaction_id: event.transaction_id,
                user_id: event.user_id,
            },
            "Work item queued",
        )),
    ))
}

/// Run a periodic job immediately
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{job}/run",
    tag = "jobs",
    params(
        ("job" = String, Path, description = "trigger-recurring-transactions, check-budget-alerts, generate-monthly-reports or keepalive"),
    ),
    responses(
        (status = 200, description = "Job finished", body = ApiResponse<JobRunResponse>),
        (status = 404, description = "Unknown job", body = ErrorResponse),
        (status = 500, description = "Job failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn run_job(
    Path(job): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<JobRunResponse>>, ApiError> {
    trace!("Entering run_job function");

    let kind: JobKind = job.parse().map_err(|_| {
        warn!("Unknown job '{}'", job);
        ErrorResponse::new(
            StatusCode::NOT_FOUND,
            "UNKNOWN_JOB",
            format!("Job '{}' does not exist", job),
        )
    })?;

    let summary = state.jobs.run(kind, Utc::now()).await.map_err(job_error)?;
    let summary = serde_json::to_value(&summary).map_err(|e| {
        ErrorResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string())
    })?;

    info!("Job {} finished on demand", kind);
    Ok(Json(ApiResponse::ok(
        JobRunResponse {
            job: kind.to_string(),
            summary,
        },
        "Job finished",
    )))
}

/// Work items that failed permanently, newest first
#[utoipa::path(
    get,
    path = "/api/v1/jobs/failed",
    tag = "jobs",
    responses(
        (status = 200, description = "Failed work items", body = ApiResponse<Vec<FailedJobResponse>>)
    )
)]
#[instrument(skip(state))]
pub async fn get_failed_jobs(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<FailedJobResponse>>> {
    let failed: Vec<FailedJobResponse> = state
        .failed_jobs
        .list()
        .await
        .into_iter()
        .map(FailedJobResponse::from)
        .collect();
    debug!("{} failed work items on record", failed.len());

    Json(ApiResponse::ok(failed, "Failed work items retrieved successfully"))
}
