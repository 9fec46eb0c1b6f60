use chrono::{DateTime, Utc};
use common::ReportSummary;
use model::entities::user;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder};
use serde_json::json;
use tracing::{error, info, instrument};

use crate::calendar::MonthRange;
use crate::error::{JobError, Result};
use crate::insight::{InsightGenerator, generate_financial_insights};
use crate::notify::{Notification, NotificationDispatcher, TemplateType};
use crate::settings::JobSettings;
use crate::stats::monthly_stats;

/// Sends every user a report for the calendar month before `now`.
///
/// Each user is handled on its own: a failure is logged and counted and the
/// run continues with the next user.
#[instrument(skip_all)]
pub async fn generate_monthly_reports(
    db: &DatabaseConnection,
    insights: &dyn InsightGenerator,
    dispatcher: &dyn NotificationDispatcher,
    settings: &JobSettings,
    now: DateTime<Utc>,
) -> Result<ReportSummary> {
    let range = MonthRange::previous(now)?;
    let users = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?;

    let mut summary = ReportSummary::default();
    for user in users {
        match send_report(db, insights, dispatcher, settings, &user, range).await {
            Ok(()) => summary.processed += 1,
            Err(e) => {
                error!("Monthly report failed for user {}: {}", user.id, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        processed = summary.processed,
        failed = summary.failed,
        month = %range.label(),
        "Monthly report run finished"
    );
    Ok(summary)
}

async fn send_report(
    db: &DatabaseConnection,
    insights: &dyn InsightGenerator,
    dispatcher: &dyn NotificationDispatcher,
    settings: &JobSettings,
    user: &user::Model,
    range: MonthRange,
) -> Result<()> {
    let month = range.label();
    let stats = monthly_stats(db, user.id, range).await?;
    let insights =
        generate_financial_insights(insights, &stats, &month, &settings.currency_code).await;

    let stats = serde_json::to_value(&stats)
        .map_err(|e| JobError::Dispatch(format!("could not encode stats: {}", e)))?;
    let notification = Notification {
        to: user.email.clone(),
        subject: format!("Your Monthly Financial Report - {}", month),
        template_type: TemplateType::MonthlyReport,
        template_data: json!({
            "userName": user.display_name(),
            "stats": stats,
            "month": month,
            "insights": insights,
        }),
    };
    dispatcher.dispatch(&notification).await
}
