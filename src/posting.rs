// 🧾 Posting Rules - which ledger pairs a finalized trade produces
//
// A pure function from trade state + commission summary to a list of
// debit/credit pairs. Nothing is written here; finalize allocates EFT
// numbers for the tagged pairs and posts the batch.
//
//   C = commission, H = HST on C, D = deposit we hold, O = coop share + HST
//
//   1. recognise:   Dr Receivable / Cr Income C,  Dr Receivable / Cr HST H
//   2. we hold:     applied = min(D, C+H) moves RE trust → commission trust
//                   D > C+H: pay coop brokerage, refund the rest to the lawyer
//                   D < C+H: the shortfall stays receivable
//   3. per agent:   expense + HST credit into payable; paid out of commission
//                   trust only when C+H is fully funded
//   4. funded:      brokerage remainder swept to the general account

use crate::commission::CommissionSummary;
use crate::entities::Trade;
use crate::eft::EftFamily;
use crate::ledger::{
    Account, LedgerBatch, AGENT_COMMISSION_EXPENSE, AGENT_COMMISSION_PAYABLE,
    COMMISSION_INCOME, COMMISSION_RECEIVABLE, COMMISSION_TRUST_BANK, GENERAL_BANK, HST_PAYABLE,
    RE_TRUST_BANK, TRUST_LIABILITY,
};
use crate::money::round_cents;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct PlannedPair {
    pub debit: Account,
    pub credit: Account,
    pub amount: Decimal,
    pub description: String,

    /// Family to draw an EFT number from, when the pair moves bank money
    pub eft: Option<EftFamily>,

    /// Who receives the funds (EFT payee)
    pub payee: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostingPlan {
    pub trade_id: String,
    pub we_hold: bool,
    pub deposit_held: Decimal,
    pub total_due: Decimal,

    /// True when the held deposit covers commission + HST
    pub fully_funded: bool,

    /// Commission + HST still owed to the brokerage after trust transfers
    pub receivable_outstanding: Decimal,

    pub pairs: Vec<PlannedPair>,
}

impl PostingPlan {
    fn push(
        &mut self,
        debit: Account,
        credit: Account,
        amount: Decimal,
        description: String,
        eft: Option<(EftFamily, String)>,
    ) {
        let amount = round_cents(amount);
        if amount <= Decimal::ZERO {
            return;
        }
        let (eft, payee) = match eft {
            Some((family, payee)) => (Some(family), Some(payee)),
            None => (None, None),
        };
        self.pairs.push(PlannedPair {
            debit,
            credit,
            amount,
            description,
            eft,
            payee,
        });
    }

    pub fn total(&self) -> Decimal {
        self.pairs.iter().map(|p| p.amount).sum()
    }

    pub fn eft_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.eft.is_some()).count()
    }

    /// Build an unposted batch with no EFT numbers (dry-run preview)
    pub fn to_batch(&self, batch: LedgerBatch) -> LedgerBatch {
        let mut batch = batch;
        for pair in &self.pairs {
            batch.push_pair(pair.debit, pair.credit, pair.amount, &pair.description, None);
        }
        batch
    }
}

/// Plan the ledger pairs for finalizing `trade`.
///
/// `refund_payee` names whoever receives any surplus deposit (normally the
/// seller's lawyer).
pub fn plan_postings(
    trade: &Trade,
    summary: &CommissionSummary,
    refund_payee: &str,
) -> PostingPlan {
    let label = format!("Trade #{}", trade.trade_number);
    let commission = summary.total_commission;
    let hst = summary.hst;
    let total_due = summary.total_with_hst;
    let we_hold = trade.we_hold();
    let deposit = if we_hold { trade.deposit_held() } else { Decimal::ZERO };
    let fully_funded = we_hold && deposit >= total_due;

    let mut plan = PostingPlan {
        trade_id: trade.id.clone(),
        we_hold,
        deposit_held: deposit,
        total_due,
        fully_funded,
        receivable_outstanding: total_due,
        pairs: Vec::new(),
    };

    // 1. Recognise commission and the HST charged on it
    plan.push(
        COMMISSION_RECEIVABLE,
        COMMISSION_INCOME,
        commission,
        format!("{} commission earned", label),
        None,
    );
    plan.push(
        COMMISSION_RECEIVABLE,
        HST_PAYABLE,
        hst,
        format!("{} HST on commission", label),
        None,
    );

    // 2. Settle out of the deposit we hold
    if we_hold {
        let applied = deposit.min(total_due);
        plan.push(
            TRUST_LIABILITY,
            RE_TRUST_BANK,
            applied,
            format!("{} deposit applied to commission", label),
            Some((EftFamily::RealEstateTrust, "Commission Trust Account".to_string())),
        );
        plan.push(
            COMMISSION_TRUST_BANK,
            COMMISSION_RECEIVABLE,
            applied,
            format!("{} commission received from trust", label),
            None,
        );
        plan.receivable_outstanding = total_due - applied;

        let mut remaining = deposit - applied;
        for broker in &trade.outside_brokers {
            if remaining <= Decimal::ZERO {
                break;
            }
            let base = round_cents(broker.commission);
            let owed = base + round_cents(base * trade.commission.hst_rate);
            let paid = remaining.min(owed);
            plan.push(
                TRUST_LIABILITY,
                RE_TRUST_BANK,
                paid,
                format!("{} co-operating commission to {}", label, broker.name),
                Some((EftFamily::RealEstateTrust, broker.name.clone())),
            );
            remaining -= paid.max(Decimal::ZERO);
        }

        plan.push(
            TRUST_LIABILITY,
            RE_TRUST_BANK,
            remaining,
            format!("{} balance of deposit released", label),
            Some((EftFamily::RealEstateTrust, refund_payee.to_string())),
        );
    }

    // 3. Agent commissions
    for agent in &summary.agents {
        plan.push(
            AGENT_COMMISSION_EXPENSE,
            AGENT_COMMISSION_PAYABLE,
            agent.agent_gross,
            format!("{} commission to {}", label, agent.agent_name),
            None,
        );
        plan.push(
            HST_PAYABLE,
            AGENT_COMMISSION_PAYABLE,
            agent.agent_hst,
            format!("{} HST charged by {}", label, agent.agent_name),
            None,
        );
        if fully_funded {
            plan.push(
                AGENT_COMMISSION_PAYABLE,
                COMMISSION_TRUST_BANK,
                agent.agent_net,
                format!("{} commission paid to {}", label, agent.agent_name),
                Some((EftFamily::CommissionTrust, agent.agent_name.clone())),
            );
        }
    }

    // 4. Brokerage keeps the rest
    if fully_funded {
        let remainder = total_due - summary.agent_net_total();
        plan.push(
            GENERAL_BANK,
            COMMISSION_TRUST_BANK,
            remainder,
            format!("{} brokerage share to general account", label),
            Some((EftFamily::CommissionTrust, "General Account".to_string())),
        );
    }

    plan
}
