// 🧮 Commission Calculation - award, fee plan split, HST
//
// Pure arithmetic over a trade and its agents. Nothing here touches the
// database; finalization feeds the summary into the posting planner.
//
//   award            = explicit amount, or total_commission × award_pct
//   brokerage_share  = award × (100 − agent_split)% + transaction_fee,
//                      limited by what is left under the annual cap
//   agent_gross      = award − brokerage_share
//   agent_hst        = agent_gross × hst_rate   (HST-registered agents only)
//   agent_net        = agent_gross + agent_hst

use crate::entities::{Agent, AgentCommissionRow, Trade};
use crate::error::BrokerageError;
use crate::money::{percent_of, round_cents};
use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCommission {
    pub agent_id: String,
    pub agent_name: String,
    pub award: Decimal,
    pub brokerage_share: Decimal,
    pub agent_gross: Decimal,
    pub agent_hst: Decimal,
    pub agent_net: Decimal,
    /// True when the annual cap reduced the brokerage share
    pub cap_applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionSummary {
    pub trade_id: String,
    pub total_commission: Decimal,
    pub hst: Decimal,
    pub total_with_hst: Decimal,
    pub agents: Vec<AgentCommission>,
}

impl CommissionSummary {
    pub fn agent_net_total(&self) -> Decimal {
        self.agents.iter().map(|a| a.agent_net).sum()
    }

    pub fn brokerage_share_total(&self) -> Decimal {
        self.agents.iter().map(|a| a.brokerage_share).sum()
    }

    /// Commission not awarded to any agent stays with the brokerage
    pub fn unallocated(&self) -> Decimal {
        let awarded: Decimal = self.agents.iter().map(|a| a.award).sum();
        self.total_commission - awarded
    }
}

// ============================================================================
// CALCULATION
// ============================================================================

/// Compute one agent's commission on one award row
pub fn calculate_agent_commission(
    row: &AgentCommissionRow,
    agent: &Agent,
    total_commission: Decimal,
    hst_rate: Decimal,
) -> AgentCommission {
    let award = row.award(total_commission);
    let plan = &agent.fee_plan;

    let mut brokerage_share =
        round_cents(percent_of(award, plan.brokerage_split_pct()))
            + round_cents(plan.transaction_fee);

    let mut cap_applied = false;
    if let Some(remaining) = agent.remaining_cap() {
        if brokerage_share > remaining {
            brokerage_share = remaining;
            cap_applied = true;
        }
    }

    let brokerage_share = brokerage_share.max(Decimal::ZERO).min(award);
    let agent_gross = award - brokerage_share;
    let agent_hst = if agent.hst_registered {
        round_cents(agent_gross * hst_rate)
    } else {
        Decimal::ZERO
    };

    AgentCommission {
        agent_id: agent.id.clone(),
        agent_name: agent.display_name(),
        award,
        brokerage_share,
        agent_gross,
        agent_hst,
        agent_net: agent_gross + agent_hst,
        cap_applied,
    }
}

/// Compute every agent row on a trade.
///
/// An agent listed on several rows sees the cap consumed by earlier rows.
pub fn calculate_trade_commissions(trade: &Trade, agents: &[Agent]) -> Result<CommissionSummary> {
    trade.validate()?;

    let mut roster: HashMap<&str, Agent> =
        agents.iter().map(|a| (a.id.as_str(), a.clone())).collect();
    let total_commission = round_cents(trade.commission.total_commission);
    let hst_rate = trade.commission.hst_rate;

    let mut rows = Vec::with_capacity(trade.agent_commissions.len());
    for row in &trade.agent_commissions {
        let agent = roster
            .get_mut(row.agent_id.as_str())
            .ok_or_else(|| BrokerageError::not_found("agent", row.agent_id.clone()))?;

        let result = calculate_agent_commission(row, agent, total_commission, hst_rate);
        agent.record_brokerage_share(result.brokerage_share);
        rows.push(result);
    }

    let awarded: Decimal = rows.iter().map(|r| r.award).sum();
    if awarded > total_commission {
        return Err(BrokerageError::Validation(format!(
            "agent awards {} exceed total commission {}",
            awarded, total_commission
        ))
        .into());
    }

    Ok(CommissionSummary {
        trade_id: trade.id.clone(),
        total_commission,
        hst: trade.commission.hst(),
        total_with_hst: trade.commission.total_with_hst(),
        agents: rows,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::FeePlan;
    use rust_decimal_macros::dec;

    fn row(agent_id: &str, pct: Decimal) -> AgentCommissionRow {
        AgentCommissionRow {
            agent_id: agent_id.to_string(),
            award_pct: pct,
            award_amount: None,
        }
    }

    fn plan(split: Decimal, fee: Decimal, cap: Option<Decimal>) -> FeePlan {
        FeePlan {
            name: "test".to_string(),
            agent_split_pct: split,
            transaction_fee: fee,
            annual_cap: cap,
        }
    }

    #[test]
    fn test_basic_split_without_hst() {
        let agent = Agent::new("Jane", "Doe", plan(dec!(80), Decimal::ZERO, None));
        let result =
            calculate_agent_commission(&row(&agent.id, dec!(100)), &agent, dec!(10000), dec!(0.13));

        assert_eq!(result.award, dec!(10000));
        assert_eq!(result.brokerage_share, dec!(2000));
        assert_eq!(result.agent_gross, dec!(8000));
        assert_eq!(result.agent_hst, Decimal::ZERO);
        assert_eq!(result.agent_net, dec!(8000));
        assert!(!result.cap_applied);
    }

    #[test]
    fn test_hst_registered_agent_with_transaction_fee() {
        let agent = Agent::new("Jane", "Doe", plan(dec!(90), dec!(250), None)).with_hst("123");
        let result =
            calculate_agent_commission(&row(&agent.id, dec!(50)), &agent, dec!(20000), dec!(0.13));

        // award 10000, share 1000 + 250
        assert_eq!(result.award, dec!(10000));
        assert_eq!(result.brokerage_share, dec!(1250));
        assert_eq!(result.agent_gross, dec!(8750));
        assert_eq!(result.agent_hst, dec!(1137.50));
        assert_eq!(result.agent_net, dec!(9887.50));
    }

    #[test]
    fn test_cap_limits_brokerage_share() {
        let mut agent = Agent::new("Sam", "Lee", plan(dec!(70), Decimal::ZERO, Some(dec!(20000))));
        agent.ytd_brokerage_share = dec!(19000);

        let result =
            calculate_agent_commission(&row(&agent.id, dec!(100)), &agent, dec!(10000), dec!(0.13));

        assert!(result.cap_applied);
        assert_eq!(result.brokerage_share, dec!(1000));
        assert_eq!(result.agent_gross, dec!(9000));
    }

    #[test]
    fn test_transaction_fee_never_exceeds_award() {
        let agent = Agent::new("Tiny", "Deal", plan(dec!(100), dec!(500), None));
        let result =
            calculate_agent_commission(&row(&agent.id, dec!(100)), &agent, dec!(300), dec!(0.13));

        assert_eq!(result.brokerage_share, dec!(300));
        assert_eq!(result.agent_gross, Decimal::ZERO);
        assert_eq!(result.agent_net, Decimal::ZERO);
    }

    #[test]
    fn test_trade_summary_two_agents() {
        let a = Agent::new("Jane", "Doe", plan(dec!(80), Decimal::ZERO, None));
        let b = Agent::new("Sam", "Lee", plan(dec!(60), Decimal::ZERO, None)).with_hst("456");

        let mut trade = Trade::new("1 King St W", dec!(20000));
        trade.agent_commissions = vec![row(&a.id, dec!(50)), row(&b.id, dec!(50))];

        let summary = calculate_trade_commissions(&trade, &[a, b]).unwrap();

        assert_eq!(summary.hst, dec!(2600.00));
        assert_eq!(summary.total_with_hst, dec!(22600.00));
        assert_eq!(summary.agents.len(), 2);
        assert_eq!(summary.agents[0].agent_net, dec!(8000));
        assert_eq!(summary.agents[1].agent_gross, dec!(6000));
        assert_eq!(summary.agents[1].agent_hst, dec!(780.00));
        assert_eq!(summary.agent_net_total(), dec!(14780.00));
        assert_eq!(summary.brokerage_share_total(), dec!(6000));
        assert_eq!(summary.unallocated(), Decimal::ZERO);
    }

    #[test]
    fn test_cap_consumed_across_rows_of_same_agent() {
        let mut agent = Agent::new("Sam", "Lee", plan(dec!(50), Decimal::ZERO, Some(dec!(1500))));
        agent.ytd_brokerage_share = Decimal::ZERO;

        let mut trade = Trade::new("1 King St W", dec!(4000));
        trade.agent_commissions = vec![row(&agent.id, dec!(50)), row(&agent.id, dec!(50))];

        let summary = calculate_trade_commissions(&trade, &[agent]).unwrap();

        assert_eq!(summary.agents[0].brokerage_share, dec!(1000));
        assert_eq!(summary.agents[1].brokerage_share, dec!(500));
        assert!(summary.agents[1].cap_applied);
    }

    #[test]
    fn test_unknown_agent_is_not_found() {
        let mut trade = Trade::new("1 King St W", dec!(4000));
        trade.agent_commissions = vec![row("ghost", dec!(100))];

        let err = calculate_trade_commissions(&trade, &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BrokerageError>(),
            Some(BrokerageError::NotFound { entity: "agent", .. })
        ));
    }

    #[test]
    fn test_explicit_awards_exceeding_commission_rejected() {
        let agent = Agent::new("Jane", "Doe", FeePlan::default());
        let mut trade = Trade::new("1 King St W", dec!(1000));
        trade.agent_commissions = vec![AgentCommissionRow {
            agent_id: agent.id.clone(),
            award_pct: Decimal::ZERO,
            award_amount: Some(dec!(1500)),
        }];

        assert!(calculate_trade_commissions(&trade, &[agent]).is_err());
    }
}
