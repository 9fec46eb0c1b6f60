use chrono::{DateTime, Utc};
use common::{BudgetAlertSummary, format_amount};
use model::entities::{account, budget, user};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, sea_query::Expr,
};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::calendar::{MonthRange, is_new_month};
use crate::error::Result;
use crate::notify::{Notification, NotificationDispatcher, TemplateType};
use crate::settings::JobSettings;
use crate::stats::account_expenses;

/// Share of the budget spent, in percent.
///
/// `None` when the budget amount is zero or negative: such a budget cannot be
/// exceeded in any meaningful way and is never alerted on.
pub fn percentage_used(total_expenses: Decimal, budget_amount: Decimal) -> Option<Decimal> {
    if budget_amount <= Decimal::ZERO {
        return None;
    }
    total_expenses
        .checked_div(budget_amount)?
        .checked_mul(Decimal::ONE_HUNDRED)
}

/// At most one alert per calendar month, once usage reaches the threshold.
pub fn should_alert(
    percentage: Decimal,
    threshold: Decimal,
    last_alert_sent: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    percentage >= threshold && last_alert_sent.is_none_or(|last| is_new_month(last, now))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evaluation {
    NoDefaultAccount,
    NotApplicable,
    Quiet,
    Alerted,
}

/// Compares this month's spending on each user's default account against the
/// user's budget and emails an alert when the threshold is crossed.
///
/// Budgets are evaluated independently: one failing budget is logged and
/// counted, and the run moves on. The month is claimed on `last_alert_sent`
/// before sending, so overlapping runs alert once. A failed send gives the
/// claim back and is retried on the next run.
#[instrument(skip_all)]
pub async fn check_budget_alerts(
    db: &DatabaseConnection,
    dispatcher: &dyn NotificationDispatcher,
    settings: &JobSettings,
    now: DateTime<Utc>,
) -> Result<BudgetAlertSummary> {
    let range = MonthRange::containing(now)?;
    let budgets = budget::Entity::find()
        .find_also_related(user::Entity)
        .order_by_asc(budget::Column::Id)
        .all(db)
        .await?;

    let mut summary = BudgetAlertSummary::default();
    for (budget, owner) in budgets {
        let Some(owner) = owner else {
            warn!("Budget {} has no owner, skipping", budget.id);
            summary.failed += 1;
            continue;
        };

        match evaluate_budget(db, dispatcher, settings, &budget, &owner, range, now).await {
            Ok(Evaluation::NoDefaultAccount) => summary.skipped_no_default_account += 1,
            Ok(Evaluation::NotApplicable) => summary.skipped_not_applicable += 1,
            Ok(Evaluation::Quiet) => summary.checked += 1,
            Ok(Evaluation::Alerted) => {
                summary.checked += 1;
                summary.alerts_sent += 1;
            }
            Err(e) => {
                error!("Budget check failed for budget {}: {}", budget.id, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        checked = summary.checked,
        alerts_sent = summary.alerts_sent,
        failed = summary.failed,
        "Budget alert run finished"
    );
    Ok(summary)
}

async fn evaluate_budget(
    db: &DatabaseConnection,
    dispatcher: &dyn NotificationDispatcher,
    settings: &JobSettings,
    budget: &budget::Model,
    owner: &user::Model,
    range: MonthRange,
    now: DateTime<Utc>,
) -> Result<Evaluation> {
    let Some(default_account) = account::Entity::find()
        .filter(account::Column::UserId.eq(owner.id))
        .filter(account::Column::IsDefault.eq(true))
        .one(db)
        .await?
    else {
        debug!("User {} has no default account", owner.id);
        return Ok(Evaluation::NoDefaultAccount);
    };

    let total_expenses = account_expenses(db, owner.id, default_account.id, range).await?;
    let Some(percentage) = percentage_used(total_expenses, budget.amount) else {
        debug!("Budget {} amount is {}, not applicable", budget.id, budget.amount);
        return Ok(Evaluation::NotApplicable);
    };

    if !should_alert(percentage, settings.alert_threshold_percent, budget.last_alert_sent, now) {
        return Ok(Evaluation::Quiet);
    }

    let currency = settings.currency_code.as_str();
    let notification = Notification {
        to: owner.email.clone(),
        subject: format!("Budget Alert for {}", default_account.name),
        template_type: TemplateType::BudgetAlert,
        template_data: json!({
            "userName": owner.display_name(),
            "percentageUsed": percentage.round_dp(1).normalize().to_string(),
            "budgetAmount": format_amount(budget.amount, currency),
            "totalExpenses": format_amount(total_expenses, currency),
            "accountName": default_account.name,
        }),
    };
    if !claim_alert_month(db, budget, now).await? {
        debug!("Budget {} was alerted by a concurrent run", budget.id);
        return Ok(Evaluation::Quiet);
    }

    if let Err(e) = dispatcher.dispatch(&notification).await {
        release_alert_month(db, budget, now).await;
        return Err(e);
    }

    info!(
        "Sent budget alert to user {} at {}% of budget",
        owner.id,
        percentage.round_dp(1)
    );
    Ok(Evaluation::Alerted)
}

/// Sets `last_alert_sent` to `now` if it still holds the value `budget` was
/// read with. Returns false when another run got there first.
async fn claim_alert_month(
    db: &DatabaseConnection,
    budget: &budget::Model,
    now: DateTime<Utc>,
) -> Result<bool> {
    let seen = match budget.last_alert_sent {
        Some(last) => budget::Column::LastAlertSent.eq(last),
        None => budget::Column::LastAlertSent.is_null(),
    };
    let claimed = budget::Entity::update_many()
        .col_expr(budget::Column::LastAlertSent, Expr::value(Some(now)))
        .col_expr(budget::Column::UpdatedAt, Expr::value(now))
        .filter(budget::Column::Id.eq(budget.id))
        .filter(seen)
        .exec(db)
        .await?;
    Ok(claimed.rows_affected == 1)
}

/// Puts back the `last_alert_sent` value a failed send claimed over.
async fn release_alert_month(
    db: &DatabaseConnection,
    budget: &budget::Model,
    claimed_at: DateTime<Utc>,
) {
    let released = budget::Entity::update_many()
        .col_expr(budget::Column::LastAlertSent, Expr::value(budget.last_alert_sent))
        .filter(budget::Column::Id.eq(budget.id))
        .filter(budget::Column::LastAlertSent.eq(claimed_at))
        .exec(db)
        .await;
    if let Err(e) = released {
        error!("Could not release alert claim on budget {}: {}", budget.id, e);
    }
}
