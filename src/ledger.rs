// 📒 General Ledger - chart of accounts, balanced batches, posting
//
// Every posting is a batch of rows that must balance:
//   Σ debits = Σ credits
// Rows are written in debit/credit pairs. Each batch gets one journal
// entry number from the "journal" counter, allocated in the same SQLite
// transaction as the rows, so numbers are gapless.

use crate::db::{insert_event, next_counter_value, Event};
use crate::error::BrokerageError;
use crate::money::{decimal_column, round_cents};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{info, warn};

// ============================================================================
// CHART OF ACCOUNTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Account {
    pub number: &'static str,
    pub name: &'static str,
}

pub const RE_TRUST_BANK: Account = Account { number: "10100", name: "Real Estate Trust Bank" };
pub const COMMISSION_TRUST_BANK: Account = Account {
    number: "10200",
    name: "Commission Trust Bank",
};
pub const GENERAL_BANK: Account = Account { number: "10300", name: "General Bank" };
pub const COMMISSION_RECEIVABLE: Account = Account {
    number: "12000",
    name: "Commission Receivable",
};
pub const TRUST_LIABILITY: Account = Account { number: "21000", name: "Trust Deposits Liability" };
pub const AGENT_COMMISSION_PAYABLE: Account = Account {
    number: "22000",
    name: "Agent Commission Payable",
};
pub const HST_PAYABLE: Account = Account { number: "23000", name: "HST Payable" };
pub const COMMISSION_INCOME: Account = Account { number: "40000", name: "Commission Income" };
pub const AGENT_COMMISSION_EXPENSE: Account = Account {
    number: "50000",
    name: "Agent Commission Expense",
};

pub const CHART: [Account; 9] = [
    RE_TRUST_BANK,
    COMMISSION_TRUST_BANK,
    GENERAL_BANK,
    COMMISSION_RECEIVABLE,
    TRUST_LIABILITY,
    AGENT_COMMISSION_PAYABLE,
    HST_PAYABLE,
    COMMISSION_INCOME,
    AGENT_COMMISSION_EXPENSE,
];

impl Account {
    pub fn lookup(number: &str) -> Option<Account> {
        CHART.iter().copied().find(|a| a.number == number)
    }

    /// Bank accounts are the ones reconciled against statements
    pub fn is_bank(&self) -> bool {
        matches!(self.number, "10100" | "10200" | "10300")
    }
}

// ============================================================================
// LEDGER ENTRY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,

    /// Journal entry number shared by every row of a batch (0 until posted)
    pub entry_number: i64,

    pub date: NaiveDate,
    pub account_number: String,
    pub account_name: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub description: String,

    #[serde(default)]
    pub eft_number: Option<i64>,

    #[serde(default)]
    pub reference: Option<String>,

    #[serde(default)]
    pub trade_id: Option<String>,

    pub batch_id: String,

    #[serde(default)]
    pub idempotency_hash: String,

    #[serde(default)]
    pub cleared: bool,
}

impl LedgerEntry {
    /// Positive for net debit, negative for net credit
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }
}

// ============================================================================
// BATCH
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LedgerBatch {
    pub batch_id: String,

    /// Stable key for the event that produced this batch (e.g. "finalize:<trade>").
    /// Recorded in `ledger_batches`; a key that is already there posts nothing.
    pub source_key: String,

    pub date: NaiveDate,
    pub trade_id: Option<String>,
    pub reference: Option<String>,
    pub entries: Vec<LedgerEntry>,
}

impl LedgerBatch {
    pub fn new(source_key: &str, date: NaiveDate) -> Self {
        LedgerBatch {
            batch_id: uuid::Uuid::new_v4().to_string(),
            source_key: source_key.to_string(),
            date,
            trade_id: None,
            reference: None,
            entries: Vec::new(),
        }
    }

    pub fn for_trade(mut self, trade_id: &str) -> Self {
        self.trade_id = Some(trade_id.to_string());
        self
    }

    /// Append a single line; callers are responsible for the batch balancing
    pub fn push_line(
        &mut self,
        account: Account,
        debit: Decimal,
        credit: Decimal,
        description: &str,
        eft_number: Option<i64>,
    ) {
        self.entries.push(LedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            entry_number: 0,
            date: self.date,
            account_number: account.number.to_string(),
            account_name: account.name.to_string(),
            debit: round_cents(debit),
            credit: round_cents(credit),
            description: description.to_string(),
            eft_number,
            reference: self.reference.clone(),
            trade_id: self.trade_id.clone(),
            batch_id: self.batch_id.clone(),
            idempotency_hash: String::new(),
            cleared: false,
        });
    }

    /// Append a matched debit/credit pair. Zero amounts add nothing.
    pub fn push_pair(
        &mut self,
        debit: Account,
        credit: Account,
        amount: Decimal,
        description: &str,
        eft_number: Option<i64>,
    ) -> bool {
        let amount = round_cents(amount);
        if amount.is_zero() {
            return false;
        }
        if amount < Decimal::ZERO {
            // A negative pair is the same pair reversed
            return self.push_pair(credit, debit, -amount, description, eft_number);
        }

        self.push_line(debit, amount, Decimal::ZERO, description, eft_number);
        self.push_line(credit, Decimal::ZERO, amount, description, eft_number);
        true
    }

    pub fn totals(&self) -> (Decimal, Decimal) {
        self.entries.iter().fold((Decimal::ZERO, Decimal::ZERO), |(d, c), e| {
            (d + e.debit, c + e.credit)
        })
    }

    pub fn is_balanced(&self) -> bool {
        let (debits, credits) = self.totals();
        debits == credits
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn row_hash(source_key: &str, index: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}", source_key, index));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// POSTING
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PostResult {
    pub entry_number: Option<i64>,
    pub inserted: usize,
    /// True when the same source had already been posted
    pub duplicate: bool,
}

/// Post a batch. Call inside a transaction when other writes depend on it.
pub fn post_batch(conn: &Connection, batch: &mut LedgerBatch, actor: &str) -> Result<PostResult> {
    let (debits, credits) = batch.totals();
    if debits != credits {
        return Err(BrokerageError::Unbalanced { debits, credits }.into());
    }
    if batch.is_empty() {
        return Ok(PostResult {
            entry_number: None,
            inserted: 0,
            duplicate: false,
        });
    }

    let source_key = batch.source_key.clone();
    for (index, entry) in batch.entries.iter_mut().enumerate() {
        entry.idempotency_hash = row_hash(&source_key, index);
    }

    let already: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM ledger_batches WHERE source_key = ?1)",
        [&source_key],
        |row| row.get(0),
    )?;
    if already {
        warn!(source = %source_key, "batch already posted, skipping");
        return Ok(PostResult {
            entry_number: None,
            inserted: 0,
            duplicate: true,
        });
    }

    let entry_number = next_counter_value(conn, "journal", 1, i64::MAX)?;

    conn.execute(
        "INSERT INTO ledger_batches (source_key, batch_id, entry_number, posted_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![source_key, batch.batch_id, entry_number, Utc::now().to_rfc3339()],
    )?;

    for entry in batch.entries.iter_mut() {
        entry.entry_number = entry_number;
        conn.execute(
            "INSERT INTO ledger_entries (
                id, entry_number, date, account_number, account_name, debit, credit,
                description, eft_number, reference, trade_id, batch_id, idempotency_hash, cleared
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                entry.id,
                entry.entry_number,
                entry.date.to_string(),
                entry.account_number,
                entry.account_name,
                entry.debit.to_string(),
                entry.credit.to_string(),
                entry.description,
                entry.eft_number,
                entry.reference,
                entry.trade_id,
                entry.batch_id,
                entry.idempotency_hash,
                entry.cleared,
            ],
        )?;
    }

    insert_event(
        conn,
        &Event::new(
            "ledger_batch_posted",
            "ledger_batch",
            &batch.batch_id,
            serde_json::json!({
                "entry_number": entry_number,
                "source": batch.source_key,
                "rows": batch.entries.len(),
                "total": debits.to_string(),
            }),
            actor,
        ),
    )?;

    info!(entry_number, rows = batch.entries.len(), total = %debits, "ledger batch posted");

    Ok(PostResult {
        entry_number: Some(entry_number),
        inserted: batch.entries.len(),
        duplicate: false,
    })
}

// ============================================================================
// QUERIES
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerFilter {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub trade_id: Option<String>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

const ENTRY_COLUMNS: &str = "id, entry_number, date, account_number, account_name, debit, credit,
     description, eft_number, reference, trade_id, batch_id, idempotency_hash, cleared";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let date_str: String = row.get(2)?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(LedgerEntry {
        id: row.get(0)?,
        entry_number: row.get(1)?,
        date,
        account_number: row.get(3)?,
        account_name: row.get(4)?,
        debit: decimal_column(row, 5)?,
        credit: decimal_column(row, 6)?,
        description: row.get(7)?,
        eft_number: row.get(8)?,
        reference: row.get(9)?,
        trade_id: row.get(10)?,
        batch_id: row.get(11)?,
        idempotency_hash: row.get(12)?,
        cleared: row.get(13)?,
    })
}

pub fn get_ledger(conn: &Connection, filter: &LedgerFilter) -> Result<Vec<LedgerEntry>> {
    let mut clauses = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(account) = &filter.account {
        values.push(account.clone());
        clauses.push(format!("account_number = ?{}", values.len()));
    }
    if let Some(trade_id) = &filter.trade_id {
        values.push(trade_id.clone());
        clauses.push(format!("trade_id = ?{}", values.len()));
    }
    if let Some(from) = filter.from {
        values.push(from.to_string());
        clauses.push(format!("date >= ?{}", values.len()));
    }
    if let Some(to) = filter.to {
        values.push(to.to_string());
        clauses.push(format!("date <= ?{}", values.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM ledger_entries {} ORDER BY entry_number, rowid",
        ENTRY_COLUMNS, where_clause
    ))?;

    let entries = stmt
        .query_map(params_from_iter(values.iter()), entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn get_ledger_for_trade(conn: &Connection, trade_id: &str) -> Result<Vec<LedgerEntry>> {
    get_ledger(
        conn,
        &LedgerFilter {
            trade_id: Some(trade_id.to_string()),
            ..LedgerFilter::default()
        },
    )
}

pub fn get_entry(conn: &Connection, id: &str) -> Result<LedgerEntry> {
    use rusqlite::OptionalExtension;

    conn.query_row(
        &format!("SELECT {} FROM ledger_entries WHERE id = ?1", ENTRY_COLUMNS),
        [id],
        entry_from_row,
    )
    .optional()?
    .ok_or_else(|| BrokerageError::not_found("ledger entry", id).into())
}

/// Flip the cleared flag on one row (reconciliation checkbox)
pub fn set_entry_cleared(conn: &Connection, id: &str, cleared: bool) -> Result<()> {
    let changed = conn.execute(
        "UPDATE ledger_entries SET cleared = ?1 WHERE id = ?2",
        params![cleared, id],
    )?;
    if changed == 0 {
        return Err(BrokerageError::not_found("ledger entry", id).into());
    }
    Ok(())
}

// ============================================================================
// TRIAL BALANCE
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AccountBalance {
    pub account_number: String,
    pub account_name: String,
    pub debits: Decimal,
    pub credits: Decimal,
    /// debits − credits
    pub balance: Decimal,
}

pub fn trial_balance(conn: &Connection) -> Result<Vec<AccountBalance>> {
    let entries = get_ledger(conn, &LedgerFilter::default())?;
    Ok(summarize_balances(&entries))
}

pub fn summarize_balances(entries: &[LedgerEntry]) -> Vec<AccountBalance> {
    let mut by_account: BTreeMap<String, AccountBalance> = BTreeMap::new();

    for entry in entries {
        let balance = by_account
            .entry(entry.account_number.clone())
            .or_insert_with(|| AccountBalance {
                account_number: entry.account_number.clone(),
                account_name: entry.account_name.clone(),
                debits: Decimal::ZERO,
                credits: Decimal::ZERO,
                balance: Decimal::ZERO,
            });
        balance.debits += entry.debit;
        balance.credits += entry.credit;
        balance.balance = balance.debits - balance.credits;
    }

    by_account.into_values().collect()
}

// ============================================================================
// MANUAL BATCHES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ManualLine {
    pub account: String,
    #[serde(default)]
    pub debit: Decimal,
    #[serde(default)]
    pub credit: Decimal,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub eft_number: Option<i64>,
}

/// A hand-entered journal entry (adjustments, bank fees, opening balances)
#[derive(Debug, Clone, Deserialize)]
pub struct ManualBatch {
    /// Replays with the same key are ignored; defaults to a fresh key
    #[serde(default)]
    pub source_key: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub trade_id: Option<String>,
    pub lines: Vec<ManualLine>,
}

impl ManualBatch {
    /// Check every line against the chart and build the batch.
    /// Balance is checked when posting.
    pub fn into_batch(self) -> Result<LedgerBatch> {
        if self.lines.len() < 2 {
            return Err(BrokerageError::Validation(
                "a journal entry needs at least two lines".to_string(),
            )
            .into());
        }

        let source_key = self
            .source_key
            .unwrap_or_else(|| format!("manual:{}", uuid::Uuid::new_v4()));
        let mut batch = LedgerBatch::new(&source_key, self.date);
        batch.reference = self.reference;
        batch.trade_id = self.trade_id;

        for line in self.lines {
            let account = Account::lookup(&line.account).ok_or_else(|| {
                BrokerageError::Validation(format!("unknown account {}", line.account))
            })?;
            if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
                return Err(BrokerageError::Validation(format!(
                    "negative amount on account {}",
                    account.number
                ))
                .into());
            }
            if line.debit.is_zero() == line.credit.is_zero() {
                return Err(BrokerageError::Validation(format!(
                    "line on account {} needs exactly one of debit or credit",
                    account.number
                ))
                .into());
            }
            batch.push_line(account, line.debit, line.credit, &line.description, line.eft_number);
        }

        Ok(batch)
    }
}

// ============================================================================
// CSV EXPORT
// ============================================================================

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "Entry")]
    entry_number: i64,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Account")]
    account_number: &'a str,
    #[serde(rename = "Account_Name")]
    account_name: &'a str,
    #[serde(rename = "Debit")]
    debit: String,
    #[serde(rename = "Credit")]
    credit: String,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "EFT")]
    eft_number: Option<i64>,
    #[serde(rename = "Trade")]
    trade_id: Option<&'a str>,
}

pub fn export_csv<W: Write>(writer: W, entries: &[LedgerEntry]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    for entry in entries {
        wtr.serialize(CsvRow {
            entry_number: entry.entry_number,
            date: entry.date.to_string(),
            account_number: &entry.account_number,
            account_name: &entry.account_name,
            debit: format!("{:.2}", entry.debit),
            credit: format!("{:.2}", entry.credit),
            description: &entry.description,
            eft_number: entry.eft_number,
            trade_id: entry.trade_id.as_deref(),
        })?;
    }

    wtr.flush()?;
    Ok(entries.len())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use rust_decimal_macros::dec;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 15).unwrap()
    }

    #[test]
    fn test_push_pair_balances_and_skips_zero() {
        let mut batch = LedgerBatch::new("test", day());

        assert!(batch.push_pair(COMMISSION_RECEIVABLE, COMMISSION_INCOME, dec!(100), "x", None));
        assert!(!batch.push_pair(COMMISSION_RECEIVABLE, HST_PAYABLE, Decimal::ZERO, "y", None));

        assert_eq!(batch.entries.len(), 2);
        assert_eq!(batch.totals(), (dec!(100), dec!(100)));
        assert!(batch.is_balanced());
    }

    #[test]
    fn test_negative_pair_is_reversed() {
        let mut batch = LedgerBatch::new("test", day());
        batch.push_pair(GENERAL_BANK, COMMISSION_TRUST_BANK, dec!(-50), "reverse", None);

        assert_eq!(batch.entries[0].account_number, "10200");
        assert_eq!(batch.entries[0].debit, dec!(50));
        assert_eq!(batch.entries[1].account_number, "10300");
        assert_eq!(batch.entries[1].credit, dec!(50));
    }

    #[test]
    fn test_unbalanced_batch_rejected() {
        let conn = test_db();
        let mut batch = LedgerBatch::new("manual", day());
        batch.push_line(GENERAL_BANK, dec!(10), Decimal::ZERO, "one-sided", None);

        let err = post_batch(&conn, &mut batch, "tester").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BrokerageError>(),
            Some(BrokerageError::Unbalanced { .. })
        ));
        assert!(get_ledger(&conn, &LedgerFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_post_assigns_sequential_entry_numbers() {
        let conn = test_db();

        let mut first = LedgerBatch::new("a", day());
        first.push_pair(COMMISSION_RECEIVABLE, COMMISSION_INCOME, dec!(100), "first", None);
        let mut second = LedgerBatch::new("b", day());
        second.push_pair(COMMISSION_RECEIVABLE, COMMISSION_INCOME, dec!(200), "second", None);

        assert_eq!(post_batch(&conn, &mut first, "tester").unwrap().entry_number, Some(1));
        assert_eq!(post_batch(&conn, &mut second, "tester").unwrap().entry_number, Some(2));

        let entries = get_ledger(&conn, &LedgerFilter::default()).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.idempotency_hash.len() == 64));
    }

    #[test]
    fn test_replayed_source_inserts_nothing() {
        let conn = test_db();

        let mut batch = LedgerBatch::new("finalize:t-1", day());
        batch.push_pair(COMMISSION_RECEIVABLE, COMMISSION_INCOME, dec!(100), "first", None);
        let mut replay = batch.clone();

        post_batch(&conn, &mut batch, "tester").unwrap();
        let result = post_batch(&conn, &mut replay, "tester").unwrap();

        assert!(result.duplicate);
        assert_eq!(result.inserted, 0);
        assert_eq!(get_ledger(&conn, &LedgerFilter::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_replay_with_changed_amounts_is_duplicate() {
        let conn = test_db();

        let mut first = LedgerBatch::new("k", day());
        first.push_pair(AGENT_COMMISSION_EXPENSE, GENERAL_BANK, dec!(4.50), "fee", None);
        let mut changed = LedgerBatch::new("k", day());
        changed.push_pair(AGENT_COMMISSION_EXPENSE, GENERAL_BANK, dec!(5.00), "fee", None);

        assert!(!post_batch(&conn, &mut first, "tester").unwrap().duplicate);
        let result = post_batch(&conn, &mut changed, "tester").unwrap();

        assert!(result.duplicate);
        assert_eq!(result.inserted, 0);
        assert_eq!(result.entry_number, None);
        assert_eq!(get_ledger(&conn, &LedgerFilter::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_replay_with_different_first_row_is_duplicate() {
        let conn = test_db();

        let mut first = LedgerBatch::new("k", day());
        first.push_pair(AGENT_COMMISSION_EXPENSE, GENERAL_BANK, dec!(4.50), "fee", None);
        let mut reshaped = LedgerBatch::new("k", day());
        reshaped.push_pair(HST_PAYABLE, GENERAL_BANK, dec!(4.50), "fee", None);

        post_batch(&conn, &mut first, "tester").unwrap();
        let result = post_batch(&conn, &mut reshaped, "tester").unwrap();

        assert!(result.duplicate);
        assert_eq!(get_ledger(&conn, &LedgerFilter::default()).unwrap().len(), 2);

        // The journal counter did not move for the skipped batch
        let mut next = LedgerBatch::new("other", day());
        next.push_pair(AGENT_COMMISSION_EXPENSE, GENERAL_BANK, dec!(1), "fee", None);
        assert_eq!(post_batch(&conn, &mut next, "tester").unwrap().entry_number, Some(2));
    }

    #[test]
    fn test_filters_and_trial_balance() {
        let conn = test_db();

        let mut batch = LedgerBatch::new("t", day()).for_trade("trade-1");
        batch.push_pair(COMMISSION_RECEIVABLE, COMMISSION_INCOME, dec!(1000), "commission", None);
        batch.push_pair(COMMISSION_RECEIVABLE, HST_PAYABLE, dec!(130), "hst", None);
        post_batch(&conn, &mut batch, "tester").unwrap();

        let receivable = get_ledger(
            &conn,
            &LedgerFilter {
                account: Some("12000".to_string()),
                ..LedgerFilter::default()
            },
        )
        .unwrap();
        assert_eq!(receivable.len(), 2);

        assert_eq!(get_ledger_for_trade(&conn, "trade-1").unwrap().len(), 4);
        assert!(get_ledger_for_trade(&conn, "trade-2").unwrap().is_empty());

        let tb = trial_balance(&conn).unwrap();
        let total: Decimal = tb.iter().map(|b| b.balance).sum();
        assert_eq!(total, Decimal::ZERO);

        let ar = tb.iter().find(|b| b.account_number == "12000").unwrap();
        assert_eq!(ar.balance, dec!(1130));
        let income = tb.iter().find(|b| b.account_number == "40000").unwrap();
        assert_eq!(income.balance, dec!(-1000));
    }

    #[test]
    fn test_export_csv() {
        let mut batch = LedgerBatch::new("t", day());
        batch.push_pair(GENERAL_BANK, COMMISSION_TRUST_BANK, dec!(12.5), "sweep", Some(2001));

        let mut out = Vec::new();
        let written = export_csv(&mut out, &batch.entries).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(written, 2);
        assert!(
            text.starts_with("Entry,Date,Account,Account_Name,Debit,Credit,Description,EFT,Trade")
        );
        assert!(text.contains("10300,General Bank,12.50,0.00,sweep,2001,"));
    }

    #[test]
    fn test_manual_batch_validation() {
        let line = |account: &str, debit: Decimal, credit: Decimal| ManualLine {
            account: account.to_string(),
            debit,
            credit,
            description: "bank fee".to_string(),
            eft_number: None,
        };
        let manual = |lines: Vec<ManualLine>| ManualBatch {
            source_key: None,
            date: day(),
            reference: None,
            trade_id: None,
            lines,
        };

        let unknown = manual(vec![
            line("99999", dec!(5), Decimal::ZERO),
            line("10300", Decimal::ZERO, dec!(5)),
        ]);
        assert!(unknown.into_batch().is_err());

        let both_sides = manual(vec![
            line("10300", dec!(5), dec!(5)),
            line("10300", Decimal::ZERO, dec!(5)),
        ]);
        assert!(both_sides.into_batch().is_err());

        assert!(manual(vec![line("10300", dec!(5), Decimal::ZERO)]).into_batch().is_err());

        let conn = test_db();
        let mut batch = manual(vec![
            line("50000", dec!(4.50), Decimal::ZERO),
            line("10300", Decimal::ZERO, dec!(4.50)),
        ])
        .into_batch()
        .unwrap();
        assert!(batch.source_key.starts_with("manual:"));
        assert_eq!(post_batch(&conn, &mut batch, "tester").unwrap().inserted, 2);
    }

    #[test]
    fn test_chart_lookup() {
        assert_eq!(Account::lookup("23000"), Some(HST_PAYABLE));
        assert!(Account::lookup("99999").is_none());
        assert!(RE_TRUST_BANK.is_bank());
        assert!(!HST_PAYABLE.is_bank());
    }
}
