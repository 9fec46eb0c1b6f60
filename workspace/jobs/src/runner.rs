use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{BudgetAlertSummary, KeepaliveStatus, ReportSummary, TriggerSummary};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::budget_alert::check_budget_alerts;
use crate::error::{JobError, Result};
use crate::insight::InsightGenerator;
use crate::keepalive::ping_database;
use crate::notify::NotificationDispatcher;
use crate::queue::WorkQueue;
use crate::report::generate_monthly_reports;
use crate::scheduler::trigger_recurring_transactions;
use crate::settings::JobSettings;

/// The periodic jobs that can be scheduled or run on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    TriggerRecurringTransactions,
    CheckBudgetAlerts,
    GenerateMonthlyReports,
    Keepalive,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::TriggerRecurringTransactions,
        JobKind::CheckBudgetAlerts,
        JobKind::GenerateMonthlyReports,
        JobKind::Keepalive,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::TriggerRecurringTransactions => "trigger-recurring-transactions",
            JobKind::CheckBudgetAlerts => "check-budget-alerts",
            JobKind::GenerateMonthlyReports => "generate-monthly-reports",
            JobKind::Keepalive => "keepalive",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| JobError::Validation(format!("Unknown job '{}'", s)))
    }
}

/// What a job run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobRunSummary {
    Trigger(TriggerSummary),
    BudgetAlerts(BudgetAlertSummary),
    Reports(ReportSummary),
    Keepalive(KeepaliveStatus),
}

/// Everything the periodic jobs need. Cheap to clone.
#[derive(Clone)]
pub struct JobContext {
    pub db: DatabaseConnection,
    pub queue: Arc<dyn WorkQueue>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub insights: Arc<dyn InsightGenerator>,
    pub settings: Arc<JobSettings>,
}

impl JobContext {
    pub async fn run(&self, kind: JobKind, now: DateTime<Utc>) -> Result<JobRunSummary> {
        info!("Running job {}", kind);
        let summary = match kind {
            JobKind::TriggerRecurringTransactions => JobRunSummary::Trigger(
                trigger_recurring_transactions(&self.db, self.queue.as_ref(), now).await?,
            ),
            JobKind::CheckBudgetAlerts => JobRunSummary::BudgetAlerts(
                check_budget_alerts(&self.db, self.dispatcher.as_ref(), &self.settings, now)
                    .await?,
            ),
            JobKind::GenerateMonthlyReports => JobRunSummary::Reports(
                generate_monthly_reports(
                    &self.db,
                    self.insights.as_ref(),
                    self.dispatcher.as_ref(),
                    &self.settings,
                    now,
                )
                .await?,
            ),
            JobKind::Keepalive => JobRunSummary::Keepalive(ping_database(&self.db).await),
        };
        Ok(summary)
    }
}

/// Six-field cron expressions (with seconds) for each periodic job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    pub recurring_transactions: String,
    pub budget_alerts: String,
    pub monthly_reports: String,
    pub keepalive: String,
}

impl Default for CronSchedule {
    fn default() -> Self {
        Self {
            recurring_transactions: "0 0 0 * * *".to_string(),
            budget_alerts: "0 0 */6 * * *".to_string(),
            monthly_reports: "0 0 0 1 * *".to_string(),
            keepalive: "0 0 0 * * Sun".to_string(),
        }
    }
}

impl CronSchedule {
    pub fn expression(&self, kind: JobKind) -> &str {
        match kind {
            JobKind::TriggerRecurringTransactions => &self.recurring_transactions,
            JobKind::CheckBudgetAlerts => &self.budget_alerts,
            JobKind::GenerateMonthlyReports => &self.monthly_reports,
            JobKind::Keepalive => &self.keepalive,
        }
    }
}

/// Registers every periodic job and starts the scheduler. Keep the returned
/// handle to shut it down.
pub async fn start_cron(context: JobContext, schedule: &CronSchedule) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    for kind in JobKind::ALL {
        let expression = schedule.expression(kind);
        let context = context.clone();
        let job = Job::new_async(expression, move |_uuid, _lock| {
            let context = context.clone();
            Box::pin(async move {
                if let Err(e) = context.run(kind, Utc::now()).await {
                    error!("Job {} failed: {}", kind, e);
                }
            })
        })?;
        scheduler.add(job).await?;
        info!("Scheduled {} with cron '{}'", kind, expression);
    }

    scheduler.start().await?;
    Ok(scheduler)
}
