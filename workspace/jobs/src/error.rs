use sea_orm::TransactionError;
use thiserror::Error;
use tracing::error;

/// Error types for the jobs module
#[derive(Error, Debug)]
pub enum JobError {
    /// Error from the database operations. Treated as transient.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Malformed work item payload. Never retried.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// A referenced row does not exist (or is not owned by the caller)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected input to a ledger or budget operation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Error from the notification dispatcher
    #[error("Notification error: {0}")]
    Dispatch(String),

    /// Error from the insight generator, including unparseable output
    #[error("Insight error: {0}")]
    Insight(String),

    /// The work queue could not accept items
    #[error("Queue error: {0}")]
    Queue(String),

    /// Error from the cron scheduler
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// A retryable error that persisted through every allowed attempt
    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<JobError>,
    },
}

impl JobError {
    /// Whether the failed unit of work may succeed if run again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::Database(_) | JobError::Queue(_))
    }
}

impl From<TransactionError<JobError>> for JobError {
    fn from(error: TransactionError<JobError>) -> Self {
        match error {
            TransactionError::Connection(db_err) => {
                error!(?db_err, "Database transaction could not be started or committed");
                JobError::Database(db_err)
            }
            TransactionError::Transaction(job_err) => job_err,
        }
    }
}

impl From<tokio_cron_scheduler::JobSchedulerError> for JobError {
    fn from(error: tokio_cron_scheduler::JobSchedulerError) -> Self {
        JobError::Scheduler(error.to_string())
    }
}

/// Type alias for Result with JobError
pub type Result<T> = std::result::Result<T, JobError>;
