//! Money and percentage formatting for human-readable output.

use rust_decimal::{Decimal, RoundingStrategy};

/// Formats an amount with two decimals and thousands separators.
///
/// `1234567.891` renders as `1,234,567.89`; negatives keep a leading `-`.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    let digits = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{sign}{grouped}.{frac_part}")
}

/// Formats an amount as dollars, e.g. `$1,500.00`.
#[must_use]
pub fn format_dollars(amount: Decimal) -> String {
    format!("${}", format_amount(amount))
}

/// Formats a percentage with two decimals, e.g. `16.67`.
///
/// Every percentage in a rendered report goes through here.
#[must_use]
pub fn format_pct(pct: Decimal) -> String {
    format!(
        "{:.2}",
        pct.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}
