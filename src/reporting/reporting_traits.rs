use crate::ledger::GroupKey;
use crate::reporting::reporting_model::CostBasisReport;
use crate::Result;

/// Trait defining the contract for read-only cost-basis reporting.
pub trait ReportingServiceTrait: Send + Sync {
    fn cost_basis(&self, group: &GroupKey) -> Result<CostBasisReport>;
}
