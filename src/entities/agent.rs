// 🧑‍💼 Agent Entity - registrant on the brokerage's roster
//
// An agent carries the fee plan that decides how each commission award is
// split between the agent and the brokerage, and the year-to-date brokerage
// share used to enforce an annual cap.

use crate::money::round_cents;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEE PLAN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeePlan {
    /// Plan label (e.g. "80/20", "95/5 capped")
    pub name: String,

    /// Percentage of the award the agent keeps (0-100)
    pub agent_split_pct: Decimal,

    /// Flat fee charged by the brokerage per trade
    #[serde(default)]
    pub transaction_fee: Decimal,

    /// Maximum brokerage share per year; None = uncapped
    #[serde(default)]
    pub annual_cap: Option<Decimal>,
}

impl Default for FeePlan {
    fn default() -> Self {
        FeePlan {
            name: "80/20".to_string(),
            agent_split_pct: dec!(80),
            transaction_fee: Decimal::ZERO,
            annual_cap: None,
        }
    }
}

impl FeePlan {
    pub fn brokerage_split_pct(&self) -> Decimal {
        Decimal::ONE_HUNDRED - self.agent_split_pct
    }
}

// ============================================================================
// AGENT ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    #[serde(default)]
    pub id: String,

    pub first_name: String,
    pub last_name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub phone: String,

    /// HST registration number, if the agent charges HST
    #[serde(default)]
    pub hst_number: Option<String>,

    #[serde(default)]
    pub hst_registered: bool,

    #[serde(default)]
    pub fee_plan: FeePlan,

    /// Brokerage share collected from this agent so far this year
    #[serde(default)]
    pub ytd_brokerage_share: Decimal,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Agent {
    pub fn new(first_name: &str, last_name: &str, fee_plan: FeePlan) -> Self {
        Agent {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: String::new(),
            phone: String::new(),
            hst_number: None,
            hst_registered: false,
            fee_plan,
            ytd_brokerage_share: Decimal::ZERO,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Mark the agent as HST-registered under the given number
    pub fn with_hst(mut self, hst_number: &str) -> Self {
        self.hst_number = Some(hst_number.to_string());
        self.hst_registered = true;
        self
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Brokerage share still collectable before the annual cap is hit.
    /// None when the plan has no cap.
    pub fn remaining_cap(&self) -> Option<Decimal> {
        self.fee_plan
            .annual_cap
            .map(|cap| (cap - self.ytd_brokerage_share).max(Decimal::ZERO))
    }

    pub fn record_brokerage_share(&mut self, amount: Decimal) {
        self.ytd_brokerage_share = round_cents(self.ytd_brokerage_share + amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_creation() {
        let agent = Agent::new("Jane", "Doe", FeePlan::default());

        assert!(!agent.id.is_empty());
        assert_eq!(agent.display_name(), "Jane Doe");
        assert!(agent.active);
        assert!(!agent.hst_registered);
        assert_eq!(agent.fee_plan.brokerage_split_pct(), dec!(20));
    }

    #[test]
    fn test_remaining_cap() {
        let plan = FeePlan {
            name: "capped".to_string(),
            agent_split_pct: dec!(70),
            transaction_fee: Decimal::ZERO,
            annual_cap: Some(dec!(20000)),
        };
        let mut agent = Agent::new("Sam", "Lee", plan);

        assert_eq!(agent.remaining_cap(), Some(dec!(20000)));

        agent.record_brokerage_share(dec!(19500));
        assert_eq!(agent.remaining_cap(), Some(dec!(500)));

        agent.record_brokerage_share(dec!(1000));
        assert_eq!(agent.remaining_cap(), Some(Decimal::ZERO));

        let uncapped = Agent::new("Ann", "Kim", FeePlan::default());
        assert_eq!(uncapped.remaining_cap(), None);
    }

    #[test]
    fn test_with_hst() {
        let agent = Agent::new("Jane", "Doe", FeePlan::default()).with_hst("123456789RT0001");
        assert!(agent.hst_registered);
        assert_eq!(agent.hst_number.as_deref(), Some("123456789RT0001"));
    }
}
