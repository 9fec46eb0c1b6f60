use rust_decimal::Decimal;
use rusty_money::{Money, iso};
use tracing::warn;

/// Formats an amount for display in notifications, e.g. `$1,500.50`.
///
/// Unknown currency codes fall back to the plain decimal rounded to cents.
pub fn format_amount(amount: Decimal, currency_code: &str) -> String {
    match iso::find(currency_code) {
        Some(currency) => Money::from_decimal(amount, currency).to_string(),
        None => {
            warn!("Unknown currency code '{}', formatting without symbol", currency_code);
            amount.round_dp(2).to_string()
        }
    }
}
