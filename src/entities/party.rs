// 🤝 Counterparty Entities - vendors, lawyers and outside brokerages
//
// All three share one shape and one table; the kind distinguishes them.

use crate::error::BrokerageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    Vendor,
    Lawyer,
    OutsideBroker,
}

impl PartyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyKind::Vendor => "vendor",
            PartyKind::Lawyer => "lawyer",
            PartyKind::OutsideBroker => "outside_broker",
        }
    }
}

impl FromStr for PartyKind {
    type Err = BrokerageError;

    /// Accepts both the stored form and the plural URL segment
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "vendor" | "vendors" => Ok(PartyKind::Vendor),
            "lawyer" | "lawyers" => Ok(PartyKind::Lawyer),
            "outside_broker" | "outside-broker" | "outside-brokers" | "outside_brokers" => {
                Ok(PartyKind::OutsideBroker)
            }
            other => Err(BrokerageError::Validation(format!(
                "unknown party kind: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub id: String,

    pub kind: PartyKind,

    pub name: String,

    /// Firm or brokerage name
    #[serde(default)]
    pub company: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub address: String,

    /// Trust account used for disbursements (lawyers, outside brokerages)
    #[serde(default)]
    pub trust_account: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Party {
    pub fn new(kind: PartyKind, name: &str) -> Self {
        Party {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            name: name.to_string(),
            company: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            trust_account: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_party_kind_parsing() {
        assert_eq!("vendors".parse::<PartyKind>().unwrap(), PartyKind::Vendor);
        assert_eq!("Lawyer".parse::<PartyKind>().unwrap(), PartyKind::Lawyer);
        assert_eq!(
            "outside-brokers".parse::<PartyKind>().unwrap(),
            PartyKind::OutsideBroker
        );
        assert!("buyers".parse::<PartyKind>().is_err());
    }

    #[test]
    fn test_party_kind_roundtrip_str() {
        for kind in [PartyKind::Vendor, PartyKind::Lawyer, PartyKind::OutsideBroker] {
            assert_eq!(kind.as_str().parse::<PartyKind>().unwrap(), kind);
        }
    }
}
