// 💵 Money helpers - Decimal amounts, rounded to cents
//
// Amounts are stored as TEXT in SQLite and parsed back into Decimal so that
// nothing in the ledger ever passes through a float.

use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Round to 2 decimal places, half away from zero (cash rounding)
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse an amount as stored in the database or typed by an operator.
/// Accepts an optional leading `$` and thousands separators.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();

    Decimal::from_str(&cleaned).with_context(|| format!("Invalid amount: {:?}", raw))
}

/// Apply a percentage expressed as 0-100
pub fn percent_of(amount: Decimal, pct: Decimal) -> Decimal {
    amount * pct / Decimal::ONE_HUNDRED
}

/// Read a TEXT amount column inside a rusqlite row mapper
pub(crate) fn decimal_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
