use common::RecurringTransactionEvent;
use serde_json::Value;

use crate::error::{JobError, Result};

/// Validates a raw work-item payload before it reaches the processor.
///
/// Both ids must be present and positive integers. Anything else is an
/// [`JobError::InvalidEvent`], which the worker never retries.
pub fn parse_event(payload: &Value) -> Result<RecurringTransactionEvent> {
    let transaction_id = required_id(payload, "transactionId")?;
    let user_id = required_id(payload, "userId")?;
    Ok(RecurringTransactionEvent::new(transaction_id, user_id))
}

/// Checks an already typed event.
pub fn validate_event(event: &RecurringTransactionEvent) -> Result<()> {
    if event.transaction_id <= 0 {
        return Err(JobError::InvalidEvent(format!(
            "transactionId must be positive, got {}",
            event.transaction_id
        )));
    }
    if event.user_id <= 0 {
        return Err(JobError::InvalidEvent(format!(
            "userId must be positive, got {}",
            event.user_id
        )));
    }
    Ok(())
}

fn required_id(payload: &Value, key: &str) -> Result<i32> {
    let raw = payload
        .get(key)
        .ok_or_else(|| JobError::InvalidEvent(format!("missing {}", key)))?;

    let id = raw
        .as_i64()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| JobError::InvalidEvent(format!("{} must be an integer, got {}", key, raw)))?;

    if id <= 0 {
        return Err(JobError::InvalidEvent(format!("{} must be positive, got {}", key, id)));
    }
    Ok(id)
}
