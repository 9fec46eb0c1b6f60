pub mod accounts;
pub mod budgets;
pub mod health;
pub mod job_runs;
pub mod transactions;
pub mod users;
