// 🔒 Trade Finalization - one-time posting of a closed deal
//
// Everything happens in one SQLite transaction: EFT numbers, ledger rows,
// agent year-to-date shares and the finalized flag. Any failure rolls the
// whole thing back, so counters never skip a number.

use crate::commission::{calculate_trade_commissions, CommissionSummary};
use crate::db::{
    get_agent, get_party, get_trade, insert_event, save_trade_document, update_agent, Event,
};
use crate::eft::{issue_eft, EftDraft, EftRecord};
use crate::entities::{Agent, PartyKind, Trade};
use crate::error::BrokerageError;
use crate::ledger::{post_batch, LedgerBatch};
use crate::posting::{plan_postings, PostingPlan};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

const DEFAULT_REFUND_PAYEE: &str = "Seller's lawyer";

#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    pub trade_id: String,
    pub trade_number: i64,
    pub entry_number: Option<i64>,
    pub rows_posted: usize,
    pub efts: Vec<EftRecord>,
    pub summary: CommissionSummary,
    pub plan: PostingPlan,
}

/// Commission summary and posting plan for a trade, without writing anything
pub fn preview(conn: &Connection, trade: &Trade) -> Result<(CommissionSummary, PostingPlan)> {
    let agents = load_agents(conn, trade)?;
    let summary = calculate_trade_commissions(trade, &agents)?;
    let refund_payee = refund_payee(conn, trade)?;
    let plan = plan_postings(trade, &summary, &refund_payee);
    Ok((summary, plan))
}

fn load_agents(conn: &Connection, trade: &Trade) -> Result<Vec<Agent>> {
    let mut agents: Vec<Agent> = Vec::new();
    for row in &trade.agent_commissions {
        if agents.iter().any(|a| a.id == row.agent_id) {
            continue;
        }
        agents.push(get_agent(conn, &row.agent_id)?);
    }
    Ok(agents)
}

fn refund_payee(conn: &Connection, trade: &Trade) -> Result<String> {
    match &trade.people.seller_lawyer_id {
        Some(id) => {
            let lawyer = get_party(conn, PartyKind::Lawyer, id)?;
            if lawyer.company.is_empty() {
                Ok(lawyer.name)
            } else {
                Ok(format!("{} ({})", lawyer.company, lawyer.name))
            }
        }
        None => Ok(DEFAULT_REFUND_PAYEE.to_string()),
    }
}

/// Finalize a trade: post its commission rows and close it. At most once.
pub fn finalize_trade(
    conn: &mut Connection,
    trade_id: &str,
    actor: &str,
) -> Result<FinalizeOutcome> {
    let tx = conn.transaction()?;

    let mut trade = get_trade(&tx, trade_id)?;
    if trade.is_finalized {
        return Err(BrokerageError::AlreadyFinalized(trade.id.clone()).into());
    }

    let mut agents: HashMap<String, Agent> = load_agents(&tx, &trade)?
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect();
    let (summary, plan) = preview(&tx, &trade)?;

    let date: NaiveDate = trade
        .key_info
        .closing_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let mut batch = LedgerBatch::new(&format!("finalize:{}", trade.id), date).for_trade(&trade.id);
    batch.reference = Some(format!("Trade #{}", trade.trade_number));

    let mut efts = Vec::with_capacity(plan.eft_count());
    for pair in &plan.pairs {
        let eft_number = match pair.eft {
            Some(family) => {
                let record = issue_eft(
                    &tx,
                    family,
                    EftDraft {
                        trade_id: Some(trade.id.clone()),
                        payee: pair.payee.clone().unwrap_or_default(),
                        amount: pair.amount,
                        memo: pair.description.clone(),
                        date,
                    },
                    actor,
                )?;
                let number = record.number;
                efts.push(record);
                Some(number)
            }
            None => None,
        };
        batch.push_pair(pair.debit, pair.credit, pair.amount, &pair.description, eft_number);
    }

    let posted = post_batch(&tx, &mut batch, actor)?;
    if posted.duplicate {
        // Ledger rows exist but the flag was never set; refuse rather than double-post
        return Err(BrokerageError::AlreadyFinalized(trade.id.clone()).into());
    }

    for (agent_id, share) in brokerage_share_by_agent(&summary) {
        if let Some(agent) = agents.get_mut(&agent_id) {
            agent.record_brokerage_share(share);
        }
    }
    for agent in agents.values() {
        update_agent(&tx, agent, actor)?;
    }

    trade.is_finalized = true;
    trade.finalized_at = Some(Utc::now());
    trade.updated_at = Utc::now();
    trade.eft_ids = efts.iter().map(|e| e.id.clone()).collect();
    save_trade_document(&tx, &trade)?;

    insert_event(
        &tx,
        &Event::new(
            "trade_finalized",
            "trade",
            &trade.id,
            serde_json::json!({
                "trade_number": trade.trade_number,
                "entry_number": posted.entry_number,
                "efts": efts.iter().map(|e| e.number).collect::<Vec<_>>(),
                "total_commission": summary.total_commission.to_string(),
                "unallocated": summary.unallocated().to_string(),
                "posted_total": plan.total().to_string(),
                "receivable_outstanding": plan.receivable_outstanding.to_string(),
            }),
            actor,
        ),
    )?;

    tx.commit()?;

    info!(
        trade_id = %trade.id,
        trade_number = trade.trade_number,
        rows = posted.inserted,
        efts = efts.len(),
        outstanding = %plan.receivable_outstanding,
        "trade finalized"
    );

    Ok(FinalizeOutcome {
        trade_id: trade.id,
        trade_number: trade.trade_number,
        entry_number: posted.entry_number,
        rows_posted: posted.inserted,
        efts,
        summary,
        plan,
    })
}

/// Total brokerage share that finalization would add to each agent's year
pub fn brokerage_share_by_agent(summary: &CommissionSummary) -> HashMap<String, Decimal> {
    let mut shares: HashMap<String, Decimal> = HashMap::new();
    for row in &summary.agents {
        *shares.entry(row.agent_id.clone()).or_insert(Decimal::ZERO) += row.brokerage_share;
    }
    shares
}
