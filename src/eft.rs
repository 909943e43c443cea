// 🏦 EFT Records - numbered disbursements per bank account family
//
// Each family owns a range of 1000 numbers:
//   RealEstateTrust 1000-1999, CommissionTrust 2000-2999,
//   GeneralAccount  3000-3999, Eft             4000-4999
// Numbers come from the family's counter row and are unique and increasing.

use crate::db::{insert_event, next_counter_value, peek_counter_value, Event};
use crate::error::BrokerageError;
use crate::money::{decimal_column, round_cents};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

// ============================================================================
// FAMILY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EftFamily {
    RealEstateTrust,
    CommissionTrust,
    GeneralAccount,
    Eft,
}

impl EftFamily {
    pub const ALL: [EftFamily; 4] = [
        EftFamily::RealEstateTrust,
        EftFamily::CommissionTrust,
        EftFamily::GeneralAccount,
        EftFamily::Eft,
    ];

    pub fn start(&self) -> i64 {
        match self {
            EftFamily::RealEstateTrust => 1000,
            EftFamily::CommissionTrust => 2000,
            EftFamily::GeneralAccount => 3000,
            EftFamily::Eft => 4000,
        }
    }

    pub fn ceiling(&self) -> i64 {
        self.start() + 999
    }

    /// Counter row name and stored family tag
    pub fn key(&self) -> &'static str {
        match self {
            EftFamily::RealEstateTrust => "real_estate_trust",
            EftFamily::CommissionTrust => "commission_trust",
            EftFamily::GeneralAccount => "general_account",
            EftFamily::Eft => "eft",
        }
    }
}

impl fmt::Display for EftFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EftFamily {
    type Err = BrokerageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "real_estate_trust" | "realestatetrust" => Ok(EftFamily::RealEstateTrust),
            "commission_trust" | "commissiontrust" => Ok(EftFamily::CommissionTrust),
            "general_account" | "generalaccount" => Ok(EftFamily::GeneralAccount),
            "eft" => Ok(EftFamily::Eft),
            other => Err(BrokerageError::Validation(format!("unknown EFT family: {}", other))),
        }
    }
}

// ============================================================================
// EFT RECORD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EftRecord {
    pub id: String,
    pub family: EftFamily,
    pub number: i64,
    pub trade_id: Option<String>,
    pub payee: String,
    pub amount: Decimal,
    pub memo: String,
    pub date: NaiveDate,
}

/// What a caller supplies; the number is allocated on issue
#[derive(Debug, Clone, Deserialize)]
pub struct EftDraft {
    #[serde(default)]
    pub trade_id: Option<String>,
    pub payee: String,
    pub amount: Decimal,
    #[serde(default)]
    pub memo: String,
    pub date: NaiveDate,
}

/// Allocate the next number for a family. Use inside the transaction that
/// consumes it.
pub fn next_number(conn: &Connection, family: EftFamily) -> Result<i64> {
    next_counter_value(conn, family.key(), family.start(), family.ceiling())
}

/// The number the next issue would receive
pub fn peek_next(conn: &Connection, family: EftFamily) -> Result<i64> {
    peek_counter_value(conn, family.key(), family.start())
}

pub fn issue_eft(
    conn: &Connection,
    family: EftFamily,
    draft: EftDraft,
    actor: &str,
) -> Result<EftRecord> {
    if draft.payee.trim().is_empty() {
        return Err(BrokerageError::Validation("EFT payee is required".to_string()).into());
    }
    if draft.amount <= Decimal::ZERO {
        return Err(BrokerageError::Validation(format!(
            "EFT amount must be positive, got {}",
            draft.amount
        ))
        .into());
    }

    let number = next_number(conn, family)?;
    let record = EftRecord {
        id: uuid::Uuid::new_v4().to_string(),
        family,
        number,
        trade_id: draft.trade_id,
        payee: draft.payee,
        amount: round_cents(draft.amount),
        memo: draft.memo,
        date: draft.date,
    };

    conn.execute(
        "INSERT INTO eft_records (id, family, number, trade_id, payee, amount, memo, date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id,
            family.key(),
            record.number,
            record.trade_id,
            record.payee,
            record.amount.to_string(),
            record.memo,
            record.date.to_string(),
        ],
    )?;

    insert_event(
        conn,
        &Event::new(
            "eft_issued",
            "eft",
            &record.id,
            serde_json::json!({
                "family": family.key(),
                "number": record.number,
                "amount": record.amount.to_string(),
                "payee": record.payee,
            }),
            actor,
        ),
    )?;

    info!(family = family.key(), eft_number = record.number, amount = %record.amount, "EFT issued");
    Ok(record)
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EftRecord> {
    let family_str: String = row.get(1)?;
    let date_str: String = row.get(7)?;

    Ok(EftRecord {
        id: row.get(0)?,
        family: family_str.parse().map_err(|e: BrokerageError| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        number: row.get(2)?,
        trade_id: row.get(3)?,
        payee: row.get(4)?,
        amount: decimal_column(row, 5)?,
        memo: row.get(6)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?,
    })
}

pub fn list_efts(conn: &Connection, family: EftFamily) -> Result<Vec<EftRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, family, number, trade_id, payee, amount, memo, date
         FROM eft_records WHERE family = ?1 ORDER BY number",
    )?;

    let records = stmt
        .query_map([family.key()], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Every EFT a trade produced. Family ranges do not overlap, so number order
/// groups them by family.
pub fn list_efts_for_trade(conn: &Connection, trade_id: &str) -> Result<Vec<EftRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, family, number, trade_id, payee, amount, memo, date
         FROM eft_records WHERE trade_id = ?1 ORDER BY number",
    )?;

    let records = stmt
        .query_map([trade_id], record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}
