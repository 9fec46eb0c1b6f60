use crate::handlers::{
    accounts::{create_account, get_accounts, set_default_account},
    budgets::{get_current_budget, upsert_budget},
    health::health_check,
    job_runs::{enqueue_recurring_transaction, get_failed_jobs, run_job},
    transactions::{
        bulk_delete_transactions, create_transaction, delete_transaction, get_transaction,
        get_transactions, update_transaction,
    },
    users::{create_user, get_user},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Users
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/:user_id", get(get_user))
        // Accounts
        .route(
            "/api/v1/users/:user_id/accounts",
            post(create_account).get(get_accounts),
        )
        .route(
            "/api/v1/users/:user_id/accounts/:account_id/default",
            put(set_default_account),
        )
        // Transactions
        .route(
            "/api/v1/users/:user_id/transactions",
            post(create_transaction).get(get_transactions),
        )
        .route(
            "/api/v1/users/:user_id/transactions/bulk-delete",
            post(bulk_delete_transactions),
        )
        .route(
            "/api/v1/users/:user_id/transactions/:transaction_id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        // Budget
        .route(
            "/api/v1/users/:user_id/budget",
            put(upsert_budget).get(get_current_budget),
        )
        // Background work
        .route(
            "/api/v1/events/recurring-transaction",
            post(enqueue_recurring_transaction),
        )
        .route("/api/v1/jobs/failed", get(get_failed_jobs))
        .route("/api/v1/jobs/:job/run", post(run_job))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
