// Entity Models
//
// Each entity has a stable UUID identity; trades additionally get a
// sequential trade number when they are first stored.

pub mod agent;
pub mod party;
pub mod trade;

pub use agent::{Agent, FeePlan};
pub use party::{Party, PartyKind};
pub use trade::{
    AgentCommissionRow, CommissionBreakdown, Condition, DealType, KeyInfo, OutsideBrokerRow,
    People, Side, Trade, TrustRecord,
};
