use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Name under which recurring-transaction work items are emitted and logged.
pub const RECURRING_TRANSACTION_EVENT: &str = "transaction.recurring.process";

/// Work item asking the processor to replay one recurring transaction.
///
/// Carries identifiers only. The processor always re-reads the transaction,
/// so a stale or duplicated item is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTransactionEvent {
    pub transaction_id: i32,
    pub user_id: i32,
}

impl RecurringTransactionEvent {
    pub fn new(transaction_id: i32, user_id: i32) -> Self {
        Self {
            transaction_id,
            user_id,
        }
    }
}
