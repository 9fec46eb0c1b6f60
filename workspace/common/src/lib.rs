//! Common transport-layer types shared between the job runner and the HTTP layer.
//! Work-item payloads, job run summaries and the report statistics all travel
//! through serde, so they live here rather than next to the code producing them.

mod events;
mod money;
mod stats;
mod summaries;

pub use events::{RECURRING_TRANSACTION_EVENT, RecurringTransactionEvent};
pub use money::format_amount;
pub use stats::MonthlyStats;
pub use summaries::{BudgetAlertSummary, KeepaliveStatus, ReportSummary, TriggerSummary};
