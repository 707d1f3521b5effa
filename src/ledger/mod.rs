pub mod fifo;
pub mod ledger_errors;
pub mod ledger_model;
pub mod ledger_service;
pub mod ledger_traits;
pub mod replay;

// Re-export the main public entry points and types
pub use fifo::{match_fifo, LotConsumption, MatchOutcome};
pub use ledger_errors::LedgerError;
pub use ledger_model::{
    GroupKey, GroupRebuildOutcome, RebuildReport, RebuildSummary, RecordedTransaction,
    SellBreakdown, ShortfallWarning,
};
pub use ledger_service::LedgerService;
pub use ledger_traits::LedgerServiceTrait;
pub use replay::{replay_group, sell_breakdown, ReplayOutcome};
