use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result of one recurrence scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TriggerSummary {
    /// Number of work items emitted.
    pub triggered: usize,
}

/// Result of one budget alert evaluation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BudgetAlertSummary {
    /// Budgets that were evaluated against their default account.
    pub checked: usize,
    pub alerts_sent: usize,
    /// Budgets whose owner has no default account.
    pub skipped_no_default_account: usize,
    /// Budgets with a non-positive amount.
    pub skipped_not_applicable: usize,
    pub failed: usize,
}

/// Result of one monthly report run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReportSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Outcome of the keepalive probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum KeepaliveStatus {
    Ok { count: u64 },
    Error { message: String },
}
