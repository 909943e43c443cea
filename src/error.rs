// ⚠️ Domain Errors - typed failures that the HTTP edge maps to status codes
//
// Library functions return anyhow::Result. These variants are wrapped in
// anyhow and recovered with downcast_ref where the caller needs to branch.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("trade {0} is already finalized")]
    AlreadyFinalized(String),

    #[error("unbalanced batch: debits {debits} != credits {credits}")]
    Unbalanced { debits: Decimal, credits: Decimal },

    #[error("EFT counter for {family} exhausted (ceiling {ceiling})")]
    CounterExhausted { family: String, ceiling: i64 },

    #[error("validation failed: {0}")]
    Validation(String),
}

impl BrokerageError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        BrokerageError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Short machine-readable code, used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            BrokerageError::NotFound { .. } => "not_found",
            BrokerageError::AlreadyFinalized(_) => "already_finalized",
            BrokerageError::Unbalanced { .. } => "unbalanced",
            BrokerageError::CounterExhausted { .. } => "counter_exhausted",
            BrokerageError::Validation(_) => "validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_messages() {
        let err = BrokerageError::not_found("trade", "abc");
        assert_eq!(err.to_string(), "trade not found: abc");
        assert_eq!(err.code(), "not_found");

        let err = BrokerageError::Unbalanced {
            debits: dec!(10.00),
            credits: dec!(9.99),
        };
        assert!(err.to_string().contains("10.00"));
        assert_eq!(err.code(), "unbalanced");
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = BrokerageError::AlreadyFinalized("t-1".to_string()).into();
        let typed = err.downcast_ref::<BrokerageError>();
        assert!(matches!(typed, Some(BrokerageError::AlreadyFinalized(id)) if id == "t-1"));
    }
}
