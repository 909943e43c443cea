use crate::entities::{Agent, Condition, FeePlan, Party, PartyKind, Trade};
use crate::error::BrokerageError;
use crate::money::decimal_column;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Event for audit trail: every state change on the books is recorded
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Parties: vendors, lawyers, outside brokerages
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS parties (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            company TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            trust_account TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Agents (fee plan kept as JSON, ytd share as decimal text)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            hst_number TEXT,
            hst_registered INTEGER NOT NULL DEFAULT 0,
            fee_plan TEXT NOT NULL,
            ytd_brokerage_share TEXT NOT NULL DEFAULT '0',
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Trades: queryable columns + full document
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS trades (
            id TEXT PRIMARY KEY,
            trade_number INTEGER UNIQUE NOT NULL,
            address TEXT NOT NULL,
            we_hold INTEGER NOT NULL DEFAULT 0,
            is_finalized INTEGER NOT NULL DEFAULT 0,
            finalized_at TEXT,
            document TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Ledger (one row per debit or credit line)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entries (
            id TEXT PRIMARY KEY,
            entry_number INTEGER NOT NULL,
            date TEXT NOT NULL,
            account_number TEXT NOT NULL,
            account_name TEXT NOT NULL,
            debit TEXT NOT NULL,
            credit TEXT NOT NULL,
            description TEXT NOT NULL,
            eft_number INTEGER,
            reference TEXT,
            trade_id TEXT,
            batch_id TEXT NOT NULL,
            idempotency_hash TEXT UNIQUE NOT NULL,
            cleared INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // One row per posted batch; a source key posts at most once
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_batches (
            source_key TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL,
            entry_number INTEGER NOT NULL,
            posted_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // EFT records + sequence counters
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS eft_records (
            id TEXT PRIMARY KEY,
            family TEXT NOT NULL,
            number INTEGER NOT NULL,
            trade_id TEXT,
            payee TEXT NOT NULL,
            amount TEXT NOT NULL,
            memo TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (family, number)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS counters (
            name TEXT PRIMARY KEY,
            next_value INTEGER NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Reconciliation settings (per account, per period)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS reconciliation_settings (
            account_number TEXT NOT NULL,
            period TEXT NOT NULL,
            statement_opening TEXT NOT NULL,
            statement_closing TEXT NOT NULL,
            cleared_entry_ids TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (account_number, period)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_account ON ledger_entries(account_number, date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_trade ON ledger_entries(trade_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_parties_kind ON parties(kind)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    debug!("database schema ready");
    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(&timestamp_str, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn parse_timestamp(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

// ============================================================================
// COUNTERS
// ============================================================================

/// Hand out the next value of a named counter.
///
/// The counter row is created at `start` on first use. Call inside the same
/// transaction as the write that consumes the number: a rollback undoes the
/// increment, so sequences stay gapless.
pub fn next_counter_value(conn: &Connection, name: &str, start: i64, ceiling: i64) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO counters (name, next_value) VALUES (?1, ?2)",
        params![name, start],
    )?;

    let value: i64 = conn.query_row(
        "SELECT next_value FROM counters WHERE name = ?1",
        [name],
        |row| row.get(0),
    )?;

    if value > ceiling {
        return Err(BrokerageError::CounterExhausted {
            family: name.to_string(),
            ceiling,
        }
        .into());
    }

    conn.execute(
        "UPDATE counters SET next_value = ?1 WHERE name = ?2",
        params![value + 1, name],
    )?;

    Ok(value)
}

/// Current counter value without consuming it
pub fn peek_counter_value(conn: &Connection, name: &str, start: i64) -> Result<i64> {
    let value: Option<i64> = conn
        .query_row(
            "SELECT next_value FROM counters WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;

    Ok(value.unwrap_or(start))
}

// ============================================================================
// PARTIES
// ============================================================================

const PARTY_COLUMNS: &str =
    "id, kind, name, company, email, phone, address, trust_account, created_at";

fn party_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Party> {
    let kind_str: String = row.get(1)?;
    let created_at: String = row.get(8)?;

    Ok(Party {
        id: row.get(0)?,
        kind: kind_str.parse().map_err(|e: BrokerageError| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        name: row.get(2)?,
        company: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        address: row.get(6)?,
        trust_account: row.get(7)?,
        created_at: parse_timestamp(&created_at, 8)?,
    })
}

pub fn insert_party(conn: &Connection, party: &mut Party, actor: &str) -> Result<()> {
    if party.id.is_empty() {
        party.id = uuid::Uuid::new_v4().to_string();
    }
    if party.name.trim().is_empty() {
        return Err(BrokerageError::Validation("party name is required".to_string()).into());
    }

    conn.execute(
        &format!(
            "INSERT INTO parties ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            PARTY_COLUMNS
        ),
        params![
            party.id,
            party.kind.as_str(),
            party.name,
            party.company,
            party.email,
            party.phone,
            party.address,
            party.trust_account,
            party.created_at.to_rfc3339(),
        ],
    )?;

    insert_event(
        conn,
        &Event::new(
            "party_created",
            party.kind.as_str(),
            &party.id,
            serde_json::json!({ "name": party.name }),
            actor,
        ),
    )?;

    info!(party_id = %party.id, kind = party.kind.as_str(), "party created");
    Ok(())
}

pub fn get_party(conn: &Connection, kind: PartyKind, id: &str) -> Result<Party> {
    conn.query_row(
        &format!("SELECT {} FROM parties WHERE id = ?1 AND kind = ?2", PARTY_COLUMNS),
        params![id, kind.as_str()],
        party_from_row,
    )
    .optional()?
    .ok_or_else(|| BrokerageError::not_found(kind.as_str(), id).into())
}

pub fn list_parties(conn: &Connection, kind: PartyKind) -> Result<Vec<Party>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM parties WHERE kind = ?1 ORDER BY name",
        PARTY_COLUMNS
    ))?;

    let parties = stmt
        .query_map([kind.as_str()], party_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(parties)
}

pub fn update_party(conn: &Connection, party: &Party, actor: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE parties
         SET name = ?1, company = ?2, email = ?3, phone = ?4, address = ?5, trust_account = ?6
         WHERE id = ?7 AND kind = ?8",
        params![
            party.name,
            party.company,
            party.email,
            party.phone,
            party.address,
            party.trust_account,
            party.id,
            party.kind.as_str(),
        ],
    )?;

    if changed == 0 {
        return Err(BrokerageError::not_found(party.kind.as_str(), party.id.clone()).into());
    }

    insert_event(
        conn,
        &Event::new(
            "party_updated",
            party.kind.as_str(),
            &party.id,
            serde_json::to_value(party)?,
            actor,
        ),
    )?;

    Ok(())
}

pub fn delete_party(conn: &Connection, kind: PartyKind, id: &str, actor: &str) -> Result<()> {
    let changed = conn.execute(
        "DELETE FROM parties WHERE id = ?1 AND kind = ?2",
        params![id, kind.as_str()],
    )?;

    if changed == 0 {
        return Err(BrokerageError::not_found(kind.as_str(), id).into());
    }

    insert_event(
        conn,
        &Event::new("party_deleted", kind.as_str(), id, serde_json::json!({}), actor),
    )?;

    Ok(())
}

// ============================================================================
// AGENTS
// ============================================================================

const AGENT_COLUMNS: &str = "id, first_name, last_name, email, phone, hst_number, hst_registered,
     fee_plan, ytd_brokerage_share, active, created_at";

fn agent_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Agent> {
    let plan_json: String = row.get(7)?;
    let created_at: String = row.get(10)?;

    let fee_plan: FeePlan = serde_json::from_str(&plan_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Agent {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        hst_number: row.get(5)?,
        hst_registered: row.get(6)?,
        fee_plan,
        ytd_brokerage_share: decimal_column(row, 8)?,
        active: row.get(9)?,
        created_at: parse_timestamp(&created_at, 10)?,
    })
}

pub fn insert_agent(conn: &Connection, agent: &mut Agent, actor: &str) -> Result<()> {
    if agent.id.is_empty() {
        agent.id = uuid::Uuid::new_v4().to_string();
    }
    validate_agent(agent)?;

    conn.execute(
        &format!(
            "INSERT INTO agents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            AGENT_COLUMNS
        ),
        params![
            agent.id,
            agent.first_name,
            agent.last_name,
            agent.email,
            agent.phone,
            agent.hst_number,
            agent.hst_registered,
            serde_json::to_string(&agent.fee_plan)?,
            agent.ytd_brokerage_share.to_string(),
            agent.active,
            agent.created_at.to_rfc3339(),
        ],
    )?;

    insert_event(
        conn,
        &Event::new(
            "agent_created",
            "agent",
            &agent.id,
            serde_json::json!({ "name": agent.display_name(), "plan": agent.fee_plan.name }),
            actor,
        ),
    )?;

    info!(agent_id = %agent.id, "agent created");
    Ok(())
}

fn validate_agent(agent: &Agent) -> Result<()> {
    if agent.first_name.trim().is_empty() && agent.last_name.trim().is_empty() {
        return Err(BrokerageError::Validation("agent name is required".to_string()).into());
    }
    let split = agent.fee_plan.agent_split_pct;
    if split < rust_decimal::Decimal::ZERO || split > rust_decimal::Decimal::ONE_HUNDRED {
        return Err(
            BrokerageError::Validation(format!("agent split out of range: {}", split)).into(),
        );
    }
    if agent.hst_registered && agent.hst_number.as_deref().unwrap_or("").is_empty() {
        return Err(BrokerageError::Validation(
            "HST-registered agent needs an HST number".to_string(),
        )
        .into());
    }
    Ok(())
}

pub fn get_agent(conn: &Connection, id: &str) -> Result<Agent> {
    conn.query_row(
        &format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS),
        [id],
        agent_from_row,
    )
    .optional()?
    .ok_or_else(|| BrokerageError::not_found("agent", id).into())
}

pub fn list_agents(conn: &Connection) -> Result<Vec<Agent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM agents ORDER BY last_name, first_name",
        AGENT_COLUMNS
    ))?;

    let agents = stmt
        .query_map([], agent_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(agents)
}

pub fn update_agent(conn: &Connection, agent: &Agent, actor: &str) -> Result<()> {
    validate_agent(agent)?;

    let changed = conn.execute(
        "UPDATE agents
         SET first_name = ?1, last_name = ?2, email = ?3, phone = ?4, hst_number = ?5,
             hst_registered = ?6, fee_plan = ?7, ytd_brokerage_share = ?8, active = ?9
         WHERE id = ?10",
        params![
            agent.first_name,
            agent.last_name,
            agent.email,
            agent.phone,
            agent.hst_number,
            agent.hst_registered,
            serde_json::to_string(&agent.fee_plan)?,
            agent.ytd_brokerage_share.to_string(),
            agent.active,
            agent.id,
        ],
    )?;

    if changed == 0 {
        return Err(BrokerageError::not_found("agent", agent.id.clone()).into());
    }

    insert_event(
        conn,
        &Event::new(
            "agent_updated",
            "agent",
            &agent.id,
            serde_json::to_value(agent)?,
            actor,
        ),
    )?;

    Ok(())
}

pub fn delete_agent(conn: &Connection, id: &str, actor: &str) -> Result<()> {
    let changed = conn.execute("DELETE FROM agents WHERE id = ?1", [id])?;

    if changed == 0 {
        return Err(BrokerageError::not_found("agent", id).into());
    }

    insert_event(
        conn,
        &Event::new("agent_deleted", "agent", id, serde_json::json!({}), actor),
    )?;

    Ok(())
}

// ============================================================================
// TRADES
// ============================================================================

fn trade_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Trade> {
    let document: String = row.get(0)?;
    let mut trade: Trade = serde_json::from_str(&document).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    // Columns are authoritative for the fields they duplicate
    trade.trade_number = row.get(1)?;
    trade.is_finalized = row.get(2)?;

    Ok(trade)
}

/// Store a new trade and assign its sequential trade number
pub fn insert_trade(conn: &Connection, trade: &mut Trade, actor: &str) -> Result<()> {
    if trade.id.is_empty() {
        trade.id = uuid::Uuid::new_v4().to_string();
    }
    trade.validate()?;

    trade.trade_number = next_counter_value(conn, "trade", 1, i64::MAX)?;
    trade.is_finalized = false;
    trade.finalized_at = None;
    trade.eft_ids.clear();

    let now = Utc::now();
    trade.created_at = now;
    trade.updated_at = now;

    conn.execute(
        "INSERT INTO trades (
            id, trade_number, address, we_hold, is_finalized, finalized_at, document,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, 0, NULL, ?5, ?6, ?7)",
        params![
            trade.id,
            trade.trade_number,
            trade.key_info.address,
            trade.we_hold(),
            serde_json::to_string(trade)?,
            now.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )
    .context("Failed to insert trade")?;

    insert_event(
        conn,
        &Event::new(
            "trade_created",
            "trade",
            &trade.id,
            serde_json::json!({
                "trade_number": trade.trade_number,
                "address": trade.key_info.address,
            }),
            actor,
        ),
    )?;

    info!(trade_id = %trade.id, trade_number = trade.trade_number, "trade created");
    Ok(())
}

pub fn get_trade(conn: &Connection, id: &str) -> Result<Trade> {
    conn.query_row(
        "SELECT document, trade_number, is_finalized FROM trades WHERE id = ?1",
        [id],
        trade_from_row,
    )
    .optional()?
    .ok_or_else(|| BrokerageError::not_found("trade", id).into())
}

pub fn list_trades(conn: &Connection) -> Result<Vec<Trade>> {
    let mut stmt = conn.prepare(
        "SELECT document, trade_number, is_finalized FROM trades ORDER BY trade_number DESC",
    )?;

    let trades = stmt
        .query_map([], trade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(trades)
}

/// Replace a trade's editable content. Finalized trades are frozen.
pub fn update_trade(conn: &Connection, trade: &mut Trade, actor: &str) -> Result<()> {
    let existing = get_trade(conn, &trade.id)?;
    if existing.is_finalized {
        return Err(BrokerageError::AlreadyFinalized(trade.id.clone()).into());
    }
    trade.validate()?;

    trade.trade_number = existing.trade_number;
    trade.created_at = existing.created_at;
    trade.is_finalized = false;
    trade.finalized_at = None;
    trade.eft_ids = existing.eft_ids;
    trade.updated_at = Utc::now();

    save_trade_document(conn, trade)?;

    insert_event(
        conn,
        &Event::new(
            "trade_updated",
            "trade",
            &trade.id,
            serde_json::json!({ "address": trade.key_info.address }),
            actor,
        ),
    )?;

    Ok(())
}

/// Write the full document and its queryable columns (no finalization check)
pub(crate) fn save_trade_document(conn: &Connection, trade: &Trade) -> Result<()> {
    let changed = conn.execute(
        "UPDATE trades
         SET address = ?1, we_hold = ?2, is_finalized = ?3, finalized_at = ?4,
             document = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            trade.key_info.address,
            trade.we_hold(),
            trade.is_finalized,
            trade.finalized_at.map(|dt| dt.to_rfc3339()),
            serde_json::to_string(trade)?,
            trade.updated_at.to_rfc3339(),
            trade.id,
        ],
    )?;

    if changed == 0 {
        return Err(BrokerageError::not_found("trade", trade.id.clone()).into());
    }

    Ok(())
}

/// A condition coming due on an open trade
#[derive(Debug, Clone, Serialize)]
pub struct DueCondition {
    pub trade_id: String,
    pub trade_number: i64,
    pub address: String,
    pub condition: Condition,
}

/// Unsatisfied conditions due within `days` of `as_of`, on trades not yet finalized
pub fn due_conditions(conn: &Connection, as_of: NaiveDate, days: i64) -> Result<Vec<DueCondition>> {
    let mut due: Vec<DueCondition> = list_trades(conn)?
        .into_iter()
        .filter(|t| !t.is_finalized)
        .flat_map(|trade| {
            trade
                .outstanding_conditions(as_of, days)
                .into_iter()
                .map(|c| DueCondition {
                    trade_id: trade.id.clone(),
                    trade_number: trade.trade_number,
                    address: trade.key_info.address.clone(),
                    condition: c.clone(),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    due.sort_by(|a, b| a.condition.due_date.cmp(&b.condition.due_date));
    Ok(due)
}
