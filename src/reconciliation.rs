// ⚖️ Reconciliation - match a bank account's ledger rows to its statement
//
// Bank accounts are debit-normal, so for one account and one month:
//   statement_opening + cleared debits - cleared credits = statement_closing
//
// Clearing is a manual checkbox per ledger row. The cleared ids live in
// reconciliation_settings, keyed by (account_number, period).

use crate::db::{insert_event, Event};
use crate::error::BrokerageError;
use crate::ledger::{get_entry, get_ledger, set_entry_cleared, Account, LedgerEntry, LedgerFilter};
use crate::money::round_cents;
use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    #[serde(default)]
    pub account_number: String,

    /// Statement month, "YYYY-MM"
    #[serde(default)]
    pub period: String,

    #[serde(default)]
    pub statement_opening: Decimal,

    #[serde(default)]
    pub statement_closing: Decimal,

    #[serde(default)]
    pub cleared_entry_ids: Vec<String>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReconciliationSettings {
    pub fn new(account_number: &str, period: &str) -> Self {
        ReconciliationSettings {
            account_number: account_number.to_string(),
            period: period.to_string(),
            statement_opening: Decimal::ZERO,
            statement_closing: Decimal::ZERO,
            cleared_entry_ids: Vec::new(),
            updated_at: None,
        }
    }

    pub fn is_cleared(&self, entry_id: &str) -> bool {
        self.cleared_entry_ids.iter().any(|id| id == entry_id)
    }
}

/// First and last day of a "YYYY-MM" period
pub fn period_bounds(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let invalid =
        || BrokerageError::Validation(format!("period must be YYYY-MM, got '{}'", period));

    let bytes = period.as_bytes();
    let well_formed = bytes.len() == 7
        && bytes[4] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || b.is_ascii_digit());
    if !well_formed {
        return Err(invalid().into());
    }

    let year: i32 = period[..4].parse().map_err(|_| invalid())?;
    let month: u32 = period[5..].parse().map_err(|_| invalid())?;

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;

    Ok((first, next.pred_opt().ok_or_else(invalid)?))
}

/// Stored settings, or empty ones when the period was never touched
pub fn get_settings(
    conn: &Connection,
    account_number: &str,
    period: &str,
) -> Result<ReconciliationSettings> {
    bank_account(account_number)?;
    period_bounds(period)?;

    let row = conn
        .query_row(
            "SELECT statement_opening, statement_closing, cleared_entry_ids, updated_at
             FROM reconciliation_settings WHERE account_number = ?1 AND period = ?2",
            params![account_number, period],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;

    let Some((opening, closing, cleared, updated_at)) = row else {
        return Ok(ReconciliationSettings::new(account_number, period));
    };

    Ok(ReconciliationSettings {
        account_number: account_number.to_string(),
        period: period.to_string(),
        statement_opening: opening.parse()?,
        statement_closing: closing.parse()?,
        cleared_entry_ids: serde_json::from_str(&cleared)?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

/// A cleared row must sit on the reconciled account inside the period
fn check_entry(
    conn: &Connection,
    account_number: &str,
    period: &str,
    bounds: (NaiveDate, NaiveDate),
    entry_id: &str,
) -> Result<LedgerEntry> {
    let entry = get_entry(conn, entry_id)?;
    if entry.account_number != account_number {
        return Err(BrokerageError::Validation(format!(
            "entry {} belongs to account {}, not {}",
            entry_id, entry.account_number, account_number
        ))
        .into());
    }
    if entry.date < bounds.0 || entry.date > bounds.1 {
        return Err(BrokerageError::Validation(format!(
            "entry {} is dated {}, outside {}",
            entry_id, entry.date, period
        ))
        .into());
    }
    Ok(entry)
}

/// Upsert statement balances and the cleared list.
///
/// Every cleared id is checked against the account and period, and the
/// `cleared` flag on the ledger rows is brought in line with the list.
/// Call inside a transaction so a rejected id leaves no flag changed.
pub fn save_settings(
    conn: &Connection,
    settings: &mut ReconciliationSettings,
    actor: &str,
) -> Result<()> {
    bank_account(&settings.account_number)?;
    let bounds = period_bounds(&settings.period)?;

    settings.statement_opening = round_cents(settings.statement_opening);
    settings.statement_closing = round_cents(settings.statement_closing);
    settings.cleared_entry_ids.sort();
    settings.cleared_entry_ids.dedup();

    for id in &settings.cleared_entry_ids {
        check_entry(conn, &settings.account_number, &settings.period, bounds, id)?;
    }

    let previous = get_settings(conn, &settings.account_number, &settings.period)?;
    for id in &previous.cleared_entry_ids {
        if !settings.is_cleared(id) {
            set_entry_cleared(conn, id, false)?;
        }
    }
    for id in &settings.cleared_entry_ids {
        if !previous.is_cleared(id) {
            set_entry_cleared(conn, id, true)?;
        }
    }

    let now = Utc::now();
    settings.updated_at = Some(now);

    conn.execute(
        "INSERT INTO reconciliation_settings (
            account_number, period, statement_opening, statement_closing,
            cleared_entry_ids, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(account_number, period) DO UPDATE SET
            statement_opening = excluded.statement_opening,
            statement_closing = excluded.statement_closing,
            cleared_entry_ids = excluded.cleared_entry_ids,
            updated_at = excluded.updated_at",
        params![
            settings.account_number,
            settings.period,
            settings.statement_opening.to_string(),
            settings.statement_closing.to_string(),
            serde_json::to_string(&settings.cleared_entry_ids)?,
            now.to_rfc3339(),
        ],
    )?;

    insert_event(
        conn,
        &Event::new(
            "reconciliation_saved",
            "reconciliation",
            &format!("{}:{}", settings.account_number, settings.period),
            serde_json::json!({
                "opening": settings.statement_opening.to_string(),
                "closing": settings.statement_closing.to_string(),
                "cleared": settings.cleared_entry_ids.len(),
            }),
            actor,
        ),
    )?;

    Ok(())
}

/// Tick or untick one ledger row for a period
pub fn set_cleared(
    conn: &Connection,
    account_number: &str,
    period: &str,
    entry_id: &str,
    cleared: bool,
    actor: &str,
) -> Result<ReconciliationSettings> {
    let mut settings = get_settings(conn, account_number, period)?;
    let bounds = period_bounds(period)?;
    check_entry(conn, account_number, period, bounds, entry_id)?;

    settings.cleared_entry_ids.retain(|id| id != entry_id);
    if cleared {
        settings.cleared_entry_ids.push(entry_id.to_string());
    }
    save_settings(conn, &mut settings, actor)?;

    info!(account = account_number, period, entry_id, cleared, "reconciliation checkbox");
    Ok(settings)
}

// ============================================================================
// RECONCILIATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReconciliationResult {
    /// Calculated closing matches the statement within tolerance
    Balanced {
        opening_balance: Decimal,
        cleared_debits: Decimal,
        cleared_credits: Decimal,
        closing_balance: Decimal,
    },

    /// Off by less than the major threshold
    MinorDiscrepancy {
        expected_balance: Decimal,
        actual_balance: Decimal,
        difference: Decimal,
        tolerance: Decimal,
    },

    /// Off by the major threshold or more; uncleared rows are the first suspects
    MajorDiscrepancy {
        expected_balance: Decimal,
        actual_balance: Decimal,
        difference: Decimal,
        outstanding_entries: Vec<String>,
    },
}

impl ReconciliationResult {
    pub fn is_balanced(&self) -> bool {
        matches!(self, ReconciliationResult::Balanced { .. })
    }

    pub fn has_discrepancy(&self) -> bool {
        !self.is_balanced()
    }

    pub fn difference(&self) -> Decimal {
        match self {
            ReconciliationResult::Balanced { .. } => Decimal::ZERO,
            ReconciliationResult::MinorDiscrepancy { difference, .. } => *difference,
            ReconciliationResult::MajorDiscrepancy { difference, .. } => *difference,
        }
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OutstandingItem {
    pub entry_id: String,
    pub entry_number: i64,
    pub date: NaiveDate,
    pub description: String,
    pub eft_number: Option<i64>,
    /// Debit minus credit
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub account_number: String,
    pub account_name: String,
    pub period: String,
    pub statement_opening: Decimal,
    pub statement_closing: Decimal,
    pub entry_count: usize,
    pub cleared_count: usize,
    pub cleared_debits: Decimal,
    pub cleared_credits: Decimal,
    pub calculated_balance: Decimal,
    pub result: ReconciliationResult,
    pub outstanding: Vec<OutstandingItem>,
    pub outstanding_total: Decimal,
    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn is_balanced(&self) -> bool {
        self.result.is_balanced()
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciliation for {} {} ({}): {} of {} rows cleared, \
             calculated ${:.2}, statement ${:.2}, difference ${:.2}",
            self.account_number,
            self.account_name,
            self.period,
            self.cleared_count,
            self.entry_count,
            self.calculated_balance,
            self.statement_closing,
            self.result.difference()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Differences below this count as balanced (default: $0.01)
    pub tolerance: Decimal,

    /// Minor vs major discrepancy (default: $10.00)
    pub major_discrepancy_threshold: Decimal,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine {
            tolerance: dec!(0.01),
            major_discrepancy_threshold: dec!(10.00),
        }
    }

    pub fn with_thresholds(tolerance: Decimal, major_threshold: Decimal) -> Self {
        ReconciliationEngine {
            tolerance,
            major_discrepancy_threshold: major_threshold,
        }
    }

    /// Reconcile an account's rows for the settings' period.
    ///
    /// Rows for other accounts or outside the period are ignored, so the
    /// caller may pass the whole ledger.
    pub fn reconcile(
        &self,
        entries: &[LedgerEntry],
        settings: &ReconciliationSettings,
    ) -> Result<ReconciliationReport> {
        let account = bank_account(&settings.account_number)?;
        let (first, last) = period_bounds(&settings.period)?;
        let cleared_ids: HashSet<&str> =
            settings.cleared_entry_ids.iter().map(String::as_str).collect();

        let in_period: Vec<&LedgerEntry> = entries
            .iter()
            .filter(|e| e.account_number == account.number && e.date >= first && e.date <= last)
            .collect();

        let (cleared, uncleared): (Vec<&LedgerEntry>, Vec<&LedgerEntry>) = in_period
            .iter()
            .partition(|e| cleared_ids.contains(e.id.as_str()));

        let cleared_debits: Decimal = cleared.iter().map(|e| e.debit).sum();
        let cleared_credits: Decimal = cleared.iter().map(|e| e.credit).sum();
        let calculated_balance = settings.statement_opening + cleared_debits - cleared_credits;
        let difference = (calculated_balance - settings.statement_closing).abs();

        let outstanding: Vec<OutstandingItem> = uncleared
            .iter()
            .map(|e| OutstandingItem {
                entry_id: e.id.clone(),
                entry_number: e.entry_number,
                date: e.date,
                description: e.description.clone(),
                eft_number: e.eft_number,
                amount: e.net(),
            })
            .collect();
        let outstanding_total = outstanding.iter().map(|o| o.amount).sum();

        let result = if difference < self.tolerance {
            ReconciliationResult::Balanced {
                opening_balance: settings.statement_opening,
                cleared_debits,
                cleared_credits,
                closing_balance: settings.statement_closing,
            }
        } else if difference < self.major_discrepancy_threshold {
            ReconciliationResult::MinorDiscrepancy {
                expected_balance: settings.statement_closing,
                actual_balance: calculated_balance,
                difference,
                tolerance: self.tolerance,
            }
        } else {
            ReconciliationResult::MajorDiscrepancy {
                expected_balance: settings.statement_closing,
                actual_balance: calculated_balance,
                difference,
                outstanding_entries: outstanding.iter().map(|o| o.entry_id.clone()).collect(),
            }
        };

        Ok(ReconciliationReport {
            account_number: account.number.to_string(),
            account_name: account.name.to_string(),
            period: settings.period.clone(),
            statement_opening: settings.statement_opening,
            statement_closing: settings.statement_closing,
            entry_count: in_period.len(),
            cleared_count: cleared.len(),
            cleared_debits,
            cleared_credits,
            calculated_balance,
            result,
            outstanding,
            outstanding_total,
            reconciled_at: Utc::now(),
        })
    }

    /// Load settings and the period's rows, then reconcile
    pub fn report(
        &self,
        conn: &Connection,
        account_number: &str,
        period: &str,
    ) -> Result<ReconciliationReport> {
        let settings = get_settings(conn, account_number, period)?;
        let (first, last) = period_bounds(period)?;
        let entries = get_ledger(
            conn,
            &LedgerFilter {
                account: Some(account_number.to_string()),
                trade_id: None,
                from: Some(first),
                to: Some(last),
            },
        )?;

        let report = self.reconcile(&entries, &settings)?;
        info!(
            account = account_number,
            period,
            balanced = report.is_balanced(),
            difference = %report.result.difference(),
            "reconciliation report"
        );
        Ok(report)
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// The month a date falls in, as a period key
pub fn period_of(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

// ============================================================================
// TESTS
// ============================================================================
