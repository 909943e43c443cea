// 🏠 Trade Entity - a real-estate deal from offer to finalization
//
// A trade is stored as a document: a handful of queryable columns plus the
// embedded sections below serialized as JSON. Once finalized it is frozen.

use crate::error::BrokerageError;
use crate::money::{percent_of, round_cents};
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// ============================================================================
// KEY INFO
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DealType {
    #[default]
    Sale,
    Lease,
}

/// Which side(s) of the deal the brokerage represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Side {
    #[default]
    Listing,
    Selling,
    Double,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeyInfo {
    #[serde(default)]
    pub mls_number: String,

    pub address: String,

    #[serde(default)]
    pub sale_price: Decimal,

    #[serde(default)]
    pub offer_date: Option<NaiveDate>,

    #[serde(default)]
    pub closing_date: Option<NaiveDate>,

    #[serde(default)]
    pub deal_type: DealType,

    #[serde(default)]
    pub side: Side,
}

// ============================================================================
// PEOPLE & OUTSIDE BROKERS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct People {
    #[serde(default)]
    pub buyers: Vec<String>,

    #[serde(default)]
    pub sellers: Vec<String>,

    /// Party ids of kind Vendor
    #[serde(default)]
    pub vendor_ids: Vec<String>,

    #[serde(default)]
    pub buyer_lawyer_id: Option<String>,

    #[serde(default)]
    pub seller_lawyer_id: Option<String>,
}

/// Cooperating brokerage on the other side of the deal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutsideBrokerRow {
    #[serde(default)]
    pub broker_id: Option<String>,

    pub name: String,

    #[serde(default)]
    pub side: Side,

    /// Commission owed to the cooperating brokerage, before HST
    #[serde(default)]
    pub commission: Decimal,
}

// ============================================================================
// TRUST RECORDS
// ============================================================================

/// A deposit received on the trade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRecord {
    #[serde(default = "new_id")]
    pub id: String,

    pub received_from: String,

    pub amount: Decimal,

    #[serde(default)]
    pub received_date: Option<NaiveDate>,

    #[serde(default)]
    pub deposit_date: Option<NaiveDate>,

    /// True when the deposit sits in this brokerage's real estate trust;
    /// false when the cooperating brokerage holds it
    #[serde(default)]
    pub we_hold: bool,

    #[serde(default)]
    pub reference: Option<String>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// COMMISSION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionBreakdown {
    /// Gross commission earned by the brokerage, before HST
    #[serde(default)]
    pub total_commission: Decimal,

    /// HST rate as a fraction (0.13 = 13%)
    #[serde(default = "default_hst_rate")]
    pub hst_rate: Decimal,
}

fn default_hst_rate() -> Decimal {
    dec!(0.13)
}

impl Default for CommissionBreakdown {
    fn default() -> Self {
        CommissionBreakdown {
            total_commission: Decimal::ZERO,
            hst_rate: default_hst_rate(),
        }
    }
}

impl CommissionBreakdown {
    pub fn hst(&self) -> Decimal {
        round_cents(self.total_commission * self.hst_rate)
    }

    pub fn total_with_hst(&self) -> Decimal {
        round_cents(self.total_commission) + self.hst()
    }
}

/// One agent's claim on the trade's commission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCommissionRow {
    pub agent_id: String,

    /// Share of the brokerage commission awarded to this agent (0-100)
    #[serde(default)]
    pub award_pct: Decimal,

    /// Explicit award; overrides award_pct when present
    #[serde(default)]
    pub award_amount: Option<Decimal>,
}

impl AgentCommissionRow {
    pub fn award(&self, total_commission: Decimal) -> Decimal {
        match self.award_amount {
            Some(amount) => round_cents(amount),
            None => round_cents(percent_of(total_commission, self.award_pct)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub description: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub satisfied: bool,
}

// ============================================================================
// TRADE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default)]
    pub id: String,

    /// Sequential human-facing number, assigned on insert
    #[serde(default)]
    pub trade_number: i64,

    pub key_info: KeyInfo,

    #[serde(default)]
    pub people: People,

    #[serde(default)]
    pub outside_brokers: Vec<OutsideBrokerRow>,

    #[serde(default)]
    pub trust_records: Vec<TrustRecord>,

    #[serde(default)]
    pub commission: CommissionBreakdown,

    #[serde(default)]
    pub agent_commissions: Vec<AgentCommissionRow>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// EFT records issued when the trade was finalized
    #[serde(default)]
    pub eft_ids: Vec<String>,

    #[serde(default)]
    pub is_finalized: bool,

    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Trade {
    pub fn new(address: &str, total_commission: Decimal) -> Self {
        let now = Utc::now();
        Trade {
            id: new_id(),
            trade_number: 0,
            key_info: KeyInfo {
                address: address.to_string(),
                ..KeyInfo::default()
            },
            people: People::default(),
            outside_brokers: Vec::new(),
            trust_records: Vec::new(),
            commission: CommissionBreakdown {
                total_commission,
                ..CommissionBreakdown::default()
            },
            agent_commissions: Vec::new(),
            conditions: Vec::new(),
            eft_ids: Vec::new(),
            is_finalized: false,
            finalized_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when any deposit is held in this brokerage's trust account
    pub fn we_hold(&self) -> bool {
        self.trust_records.iter().any(|r| r.we_hold)
    }

    /// Sum of deposits held in our trust account
    pub fn deposit_held(&self) -> Decimal {
        self.trust_records
            .iter()
            .filter(|r| r.we_hold)
            .map(|r| round_cents(r.amount))
            .sum()
    }

    /// What the cooperating brokerages are owed, HST included
    pub fn outside_broker_total_with_hst(&self, hst_rate: Decimal) -> Decimal {
        self.outside_brokers
            .iter()
            .map(|b| {
                let base = round_cents(b.commission);
                base + round_cents(base * hst_rate)
            })
            .sum()
    }

    /// Unsatisfied conditions due on or before `as_of + days`
    pub fn outstanding_conditions(&self, as_of: NaiveDate, days: i64) -> Vec<&Condition> {
        let horizon = as_of + Duration::days(days);
        self.conditions
            .iter()
            .filter(|c| !c.satisfied && c.due_date <= horizon)
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.key_info.address.trim().is_empty() {
            problems.push("address is required".to_string());
        }
        if self.commission.total_commission < Decimal::ZERO {
            problems.push("total commission cannot be negative".to_string());
        }
        if self.commission.hst_rate < Decimal::ZERO || self.commission.hst_rate >= Decimal::ONE {
            problems.push(format!("hst rate out of range: {}", self.commission.hst_rate));
        }

        let mut pct_total = Decimal::ZERO;
        for row in &self.agent_commissions {
            if row.award_pct < Decimal::ZERO || row.award_pct > Decimal::ONE_HUNDRED {
                problems.push(format!(
                    "award percentage for agent {} out of range: {}",
                    row.agent_id, row.award_pct
                ));
            }
            if matches!(row.award_amount, Some(a) if a < Decimal::ZERO) {
                problems.push(format!("negative award for agent {}", row.agent_id));
            }
            if row.award_amount.is_none() {
                pct_total += row.award_pct;
            }
        }
        if pct_total > Decimal::ONE_HUNDRED {
            problems.push(format!("award percentages sum to {}", pct_total));
        }

        for broker in &self.outside_brokers {
            if broker.name.trim().is_empty() {
                problems.push("outside broker name is required".to_string());
            }
            if broker.commission < Decimal::ZERO {
                problems.push(format!("negative commission for outside broker {}", broker.name));
            }
        }

        for record in &self.trust_records {
            if record.amount < Decimal::ZERO {
                problems.push(format!("negative trust deposit from {}", record.received_from));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(BrokerageError::Validation(problems.join("; ")).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deposit(amount: Decimal, we_hold: bool) -> TrustRecord {
        TrustRecord {
            id: new_id(),
            received_from: "Buyer".to_string(),
            amount,
            received_date: None,
            deposit_date: None,
            we_hold,
            reference: None,
        }
    }

    #[test]
    fn test_commission_breakdown() {
        let breakdown = CommissionBreakdown {
            total_commission: dec!(20000),
            hst_rate: dec!(0.13),
        };
        assert_eq!(breakdown.hst(), dec!(2600.00));
        assert_eq!(breakdown.total_with_hst(), dec!(22600.00));
    }

    #[test]
    fn test_we_hold_and_deposit() {
        let mut trade = Trade::new("1 King St W", dec!(20000));
        assert!(!trade.we_hold());

        trade.trust_records.push(deposit(dec!(25000), true));
        trade.trust_records.push(deposit(dec!(5000), false));

        assert!(trade.we_hold());
        assert_eq!(trade.deposit_held(), dec!(25000));
    }

    #[test]
    fn test_award_pct_vs_explicit_amount() {
        let by_pct = AgentCommissionRow {
            agent_id: "a".to_string(),
            award_pct: dec!(50),
            award_amount: None,
        };
        let explicit = AgentCommissionRow {
            agent_id: "b".to_string(),
            award_pct: dec!(50),
            award_amount: Some(dec!(1234.567)),
        };

        assert_eq!(by_pct.award(dec!(20000)), dec!(10000));
        assert_eq!(explicit.award(dec!(20000)), dec!(1234.57));
    }

    #[test]
    fn test_validate_rejects_over_allocated_awards() {
        let mut trade = Trade::new("1 King St W", dec!(20000));
        for id in ["a", "b"] {
            trade.agent_commissions.push(AgentCommissionRow {
                agent_id: id.to_string(),
                award_pct: dec!(60),
                award_amount: None,
            });
        }

        let err = trade.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 120"));
    }

    #[test]
    fn test_validate_ok() {
        let mut trade = Trade::new("1 King St W", dec!(20000));
        trade.agent_commissions.push(AgentCommissionRow {
            agent_id: "a".to_string(),
            award_pct: dec!(100),
            award_amount: None,
        });
        assert!(trade.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_outside_broker_name() {
        let mut trade = Trade::new("1 King St W", dec!(20000));
        trade.outside_brokers.push(OutsideBrokerRow {
            broker_id: None,
            name: "  ".to_string(),
            side: Side::Selling,
            commission: dec!(10000),
        });

        let err = trade.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BrokerageError>(),
            Some(BrokerageError::Validation(msg)) if msg.contains("outside broker name")
        ));

        trade.outside_brokers[0].name = "Coop Realty".to_string();
        assert!(trade.validate().is_ok());
    }

    #[test]
    fn test_outstanding_conditions() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut trade = Trade::new("1 King St W", dec!(20000));
        trade.conditions = vec![
            Condition {
                description: "Financing".to_string(),
                due_date: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
                satisfied: false,
            },
            Condition {
                description: "Inspection".to_string(),
                due_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                satisfied: true,
            },
            Condition {
                description: "Status certificate".to_string(),
                due_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
                satisfied: false,
            },
        ];

        let due = trade.outstanding_conditions(today, 7);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].description, "Financing");
    }

    #[test]
    fn test_outside_broker_total_with_hst() {
        let mut trade = Trade::new("1 King St W", dec!(20000));
        trade.outside_brokers.push(OutsideBrokerRow {
            broker_id: None,
            name: "Coop Realty".to_string(),
            side: Side::Selling,
            commission: dec!(10000),
        });
        assert_eq!(trade.outside_broker_total_with_hst(dec!(0.13)), dec!(11300.00));
    }
}
