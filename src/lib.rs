// Brokerage Ledger - Core Library
// Trades, agent commissions, trust EFTs and the general ledger, shared by
// the CLI, the TUI and the API server.

pub mod error;
pub mod money;
pub mod config;
pub mod entities;
pub mod db;
pub mod commission;   // Agent splits, fees, caps, HST
pub mod ledger;       // Chart of accounts + balanced batches
pub mod eft;          // Numbered disbursements per bank account family
pub mod posting;      // Finalization posting rules (pure)
pub mod finalize;     // One-transaction trade finalization
pub mod reconciliation;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use commission::{
    calculate_agent_commission, calculate_trade_commissions, AgentCommission, CommissionSummary,
};
pub use config::Config;
pub use db::{
    delete_agent, delete_party, due_conditions, get_agent, get_events_for_entity, get_party,
    get_trade, insert_agent, insert_event, insert_party, insert_trade, list_agents, list_parties,
    list_trades, setup_database, update_agent, update_party, update_trade, DueCondition, Event,
};
pub use eft::{issue_eft, list_efts, peek_next, EftDraft, EftFamily, EftRecord};
pub use entities::{
    Agent, AgentCommissionRow, CommissionBreakdown, Condition, DealType, FeePlan, KeyInfo,
    OutsideBrokerRow, Party, PartyKind, People, Side, Trade, TrustRecord,
};
pub use error::BrokerageError;
pub use finalize::{finalize_trade, FinalizeOutcome};
pub use ledger::{
    export_csv, get_ledger, post_batch, trial_balance, Account, AccountBalance, LedgerBatch,
    LedgerEntry, LedgerFilter, ManualBatch, ManualLine, PostResult, CHART,
};
pub use posting::{plan_postings, PlannedPair, PostingPlan};
pub use reconciliation::{
    OutstandingItem, ReconciliationEngine, ReconciliationReport, ReconciliationResult,
    ReconciliationSettings,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Logs go to stderr so the TUI and CSV output on stdout stay clean.
pub fn init_tracing(default_filter: &str) {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
