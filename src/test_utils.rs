use crate::config::{AppConfig, build_app_state};
use crate::router::create_router;
use crate::schemas::AppState;
use axum::Router;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Config with short retry delays. Email and insights stay disabled, so
/// notifications are only logged and reports use the fallback insights.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jobs.retry_base_delay_ms = 1;
    config
}

/// Create AppState for testing with two registered users (ids 1 and 2).
/// The recurring-transaction worker runs for as long as the state lives.
pub async fn setup_test_app_state() -> AppState {
    let db = setup_test_db().await;

    for (email, name) in [("alice@example.com", Some("Alice")), ("bob@example.com", None)] {
        model::entities::user::ActiveModel {
            email: Set(email.to_string()),
            name: Set(name.map(str::to_string)),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .expect("Failed to create test user");
    }

    let (state, _worker) =
        build_app_state(db, &test_config()).expect("Failed to build application state");
    state
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level is taken from RUST_LOG, defaulting to WARN.
fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| match level.to_uppercase().as_str() {
            "ERROR" => Some(Level::ERROR),
            "WARN" => Some(Level::WARN),
            "INFO" => Some(Level::INFO),
            "DEBUG" => Some(Level::DEBUG),
            "TRACE" => Some(Level::TRACE),
            _ => None,
        })
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Create axum app for testing
pub async fn setup_test_app() -> Router {
    let _guard = init_test_tracing();
    let state = setup_test_app_state().await;
    create_router(state)
}

/// Like [`setup_test_app`], but also hands back the state so tests can
/// inspect the database and the failed-jobs registry.
pub async fn setup_test_app_with_state() -> (Router, AppState) {
    let _guard = init_test_tracing();
    let state = setup_test_app_state().await;
    (create_router(state.clone()), state)
}
