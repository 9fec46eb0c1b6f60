use anyhow::Result;
use chrono::Utc;
use jobs::JobKind;
use tracing::{debug, error, info, trace};

use crate::config::{AppConfig, initialize_app_state};

/// Runs one job to completion. Work items queued by the recurrence scheduler
/// are drained by the in-process worker before returning.
pub async fn run_job(job: &str, database_url: &str) -> Result<()> {
    trace!("Entering run_job function");
    let kind: JobKind = job.parse()?;
    debug!("Database URL: {}", database_url);

    let config = AppConfig::load()?;
    let (state, worker) = initialize_app_state(database_url, &config).await?;

    let outcome = state.jobs.run(kind, Utc::now()).await;
    let failed_jobs = state.failed_jobs.clone();

    // Closing the queue lets the worker finish what is in flight and exit
    drop(state);
    if let Err(e) = worker.await {
        error!("Worker task ended abnormally: {}", e);
    }

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            error!("Job {} failed: {}", kind, e);
            return Err(e.into());
        }
    };

    info!("Job {} finished", kind);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let failed = failed_jobs.len().await;
    if failed > 0 {
        error!("{} work items could not be processed", failed);
        for entry in failed_jobs.list().await {
            error!(
                "Transaction {} for user {}: {}",
                entry.event.transaction_id, entry.event.user_id, entry.error
            );
        }
    }
    Ok(())
}
