use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Aggregated figures for one user over one calendar month.
///
/// `by_category` only tracks expenses. Income is reported as a single total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStats {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub by_category: BTreeMap<String, Decimal>,
    pub transaction_count: u64,
}

impl MonthlyStats {
    pub fn record_income(&mut self, amount: Decimal) {
        self.total_income += amount;
        self.transaction_count += 1;
    }

    pub fn record_expense(&mut self, category: &str, amount: Decimal) {
        self.total_expenses += amount;
        *self
            .by_category
            .entry(category.to_string())
            .or_insert(Decimal::ZERO) += amount;
        self.transaction_count += 1;
    }

    /// Income minus expenses.
    pub fn net(&self) -> Decimal {
        self.total_income - self.total_expenses
    }
}
