use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use jobs::insight::{DisabledInsightGenerator, GeminiInsightGenerator, InsightGenerator};
use jobs::notify::{HttpEmailDispatcher, LogDispatcher, NotificationDispatcher};
use jobs::queue::ChannelQueue;
use jobs::retry::RetryPolicy;
use jobs::worker::{FailedJobs, RecurringWorker};
use jobs::{CronSchedule, JobContext, JobSettings};
use rust_decimal::Decimal;
use sea_orm::{Database, DatabaseConnection};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::schemas::AppState;

/// Settings that are not CLI arguments. Read from an optional `finflow.toml`
/// and `FINFLOW__SECTION__KEY` environment variables, e.g.
/// `FINFLOW__EMAIL__API_KEY`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub jobs: JobsConfig,
    pub email: EmailConfig,
    pub insights: InsightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Start the cron scheduler in `serve`. The worker always runs.
    pub scheduler_enabled: bool,
    pub recurring_transactions_cron: String,
    pub budget_alerts_cron: String,
    pub monthly_reports_cron: String,
    pub keepalive_cron: String,
    pub alert_threshold_percent: u32,
    pub currency_code: String,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    /// Replays per user per `throttle_period_secs`.
    pub throttle_limit: u32,
    pub throttle_period_secs: u64,
    pub queue_capacity: usize,
    pub failed_jobs_capacity: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        let schedule = CronSchedule::default();
        let settings = JobSettings::default();
        Self {
            scheduler_enabled: true,
            recurring_transactions_cron: schedule.recurring_transactions,
            budget_alerts_cron: schedule.budget_alerts,
            monthly_reports_cron: schedule.monthly_reports,
            keepalive_cron: schedule.keepalive,
            alert_threshold_percent: 80,
            currency_code: settings.currency_code,
            retry_attempts: settings.retry.max_attempts,
            retry_base_delay_ms: settings.retry.base_delay.as_millis() as u64,
            throttle_limit: settings.throttle_limit,
            throttle_period_secs: settings.throttle_period.as_secs(),
            queue_capacity: settings.queue_capacity,
            failed_jobs_capacity: settings.failed_jobs_capacity,
        }
    }
}

impl JobsConfig {
    pub fn settings(&self) -> JobSettings {
        JobSettings {
            alert_threshold_percent: Decimal::from(self.alert_threshold_percent),
            currency_code: self.currency_code.clone(),
            retry: RetryPolicy::new(
                self.retry_attempts,
                Duration::from_millis(self.retry_base_delay_ms),
            ),
            throttle_limit: self.throttle_limit,
            throttle_period: Duration::from_secs(self.throttle_period_secs),
            queue_capacity: self.queue_capacity,
            failed_jobs_capacity: self.failed_jobs_capacity,
        }
    }

    pub fn schedule(&self) -> CronSchedule {
        CronSchedule {
            recurring_transactions: self.recurring_transactions_cron.clone(),
            budget_alerts: self.budget_alerts_cron.clone(),
            monthly_reports: self.monthly_reports_cron.clone(),
            keepalive: self.keepalive_cron.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub api_url: String,
    /// Without a key, notifications are only logged.
    pub api_key: Option<String>,
    pub from: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from: "Finance App <onboarding@resend.dev>".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub base_url: String,
    /// Without a key, reports carry the fallback insights.
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `finflow.toml` (if present) overlaid with `FINFLOW__*` variables.
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("finflow").required(false))
            .add_source(
                Environment::with_prefix("FINFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: AppConfig = builder.build()?.try_deserialize()?;
        debug!(
            "Loaded configuration: email delivery {}, insights {}",
            if config.email.api_key.is_some() { "enabled" } else { "disabled" },
            if config.insights.api_key.is_some() { "enabled" } else { "disabled" },
        );
        Ok(config)
    }

    fn dispatcher(&self) -> Arc<dyn NotificationDispatcher> {
        match &self.email.api_key {
            Some(key) => Arc::new(HttpEmailDispatcher::new(
                self.email.api_url.clone(),
                key.clone(),
                self.email.from.clone(),
            )),
            None => {
                warn!("No email API key configured, notifications will only be logged");
                Arc::new(LogDispatcher)
            }
        }
    }

    fn insight_generator(&self) -> Arc<dyn InsightGenerator> {
        match &self.insights.api_key {
            Some(key) => Arc::new(GeminiInsightGenerator::new(
                self.insights.base_url.clone(),
                key.clone(),
                self.insights.model.clone(),
            )),
            None => {
                warn!("No insights API key configured, reports will use fallback insights");
                Arc::new(DisabledInsightGenerator)
            }
        }
    }
}

/// Initialize application state from a database URL
pub async fn initialize_app_state(
    database_url: &str,
    config: &AppConfig,
) -> Result<(AppState, JoinHandle<()>)> {
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;
    build_app_state(db, config)
}

/// Wires the job pipeline around an open connection and starts the
/// recurring-transaction worker. The worker stops once every clone of the
/// returned state (and any scheduler holding its job context) is dropped.
pub fn build_app_state(
    db: DatabaseConnection,
    config: &AppConfig,
) -> Result<(AppState, JoinHandle<()>)> {
    let settings = config.jobs.settings();
    let failed_jobs = FailedJobs::new(settings.failed_jobs_capacity);
    let worker = RecurringWorker::new(db.clone(), &settings, failed_jobs.clone())?;
    let (queue, receiver) = ChannelQueue::new(settings.queue_capacity);
    let worker = tokio::spawn(worker.run(receiver));

    let jobs = JobContext {
        db: db.clone(),
        queue: Arc::new(queue),
        dispatcher: config.dispatcher(),
        insights: config.insight_generator(),
        settings: Arc::new(settings),
    };

    Ok((AppState { db, jobs, failed_jobs }, worker))
}
