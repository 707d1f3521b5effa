use crate::ledger::ledger_model::{GroupKey, RebuildReport, RebuildSummary, RecordedTransaction};
use crate::transactions::NewTransaction;
use crate::Result;

/// Trait defining the contract for ledger mutations.
#[async_trait::async_trait]
pub trait LedgerServiceTrait: Send + Sync {
    async fn record_transaction(
        &self,
        new_transaction: NewTransaction,
    ) -> Result<RecordedTransaction>;
    async fn rebuild_group(&self, group: &GroupKey) -> Result<RebuildSummary>;
    async fn rebuild_all(&self) -> Result<RebuildReport>;
}
