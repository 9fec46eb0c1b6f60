//! Background jobs for the finance backend.
//!
//! * [`scheduler`] finds due recurring transactions and queues one work item each.
//! * [`worker`] drains the queue with per-user throttling and retries, handing
//!   items to [`processor`], which replays a transaction exactly once per cycle.
//! * [`budget_alert`] and [`report`] run on their own schedules and talk to the
//!   outside world through [`notify`] and [`insight`].
//! * [`runner`] wires all periodic jobs to cron expressions.
//!
//! [`ledger`] holds the synchronous write paths (booking, editing and deleting
//! transactions, accounts, budgets) that share the balance bookkeeping.

pub mod budget_alert;
pub mod calendar;
pub mod error;
pub mod events;
pub mod insight;
pub mod keepalive;
pub mod ledger;
pub mod notify;
pub mod processor;
pub mod queue;
pub mod recurrence;
pub mod report;
pub mod retry;
pub mod runner;
pub mod scheduler;
pub mod settings;
pub mod stats;
pub mod throttle;
pub mod worker;

#[cfg(test)]
mod testing;

pub use error::{JobError, Result};
pub use runner::{CronSchedule, JobContext, JobKind, JobRunSummary, start_cron};
pub use settings::JobSettings;
