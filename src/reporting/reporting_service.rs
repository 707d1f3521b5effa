use log::debug;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::ledger::GroupKey;
use crate::lots::{LotRepository, PurchaseLot, ROUNDING_SCALE};
use crate::reporting::reporting_model::{CostBasisReport, OpenLotSummary};
use crate::reporting::ReportingServiceTrait;
use crate::Result;

/// Read-only reporting over live lots. No side effects.
pub struct ReportingService {
    lot_repository: Arc<LotRepository>,
}

impl ReportingService {
    pub fn new(lot_repository: Arc<LotRepository>) -> Self {
        Self { lot_repository }
    }
}

/// Cost basis of the shares still held in a lot, at the lot's original
/// unit economics: `total_cost * remaining / quantity`.
fn remaining_cost(lot: &PurchaseLot) -> Decimal {
    if lot.quantity == 0 {
        return Decimal::ZERO;
    }
    (lot.total_cost * Decimal::from(lot.remaining_quantity) / Decimal::from(lot.quantity))
        .round_dp(ROUNDING_SCALE)
}

impl ReportingServiceTrait for ReportingService {
    fn cost_basis(&self, group: &GroupKey) -> Result<CostBasisReport> {
        let lots = self.lot_repository.list_open_lots(group)?;

        let open_quantity: i64 = lots.iter().map(|lot| lot.remaining_quantity).sum();
        let total_remaining_cost: Decimal = lots.iter().map(remaining_cost).sum();

        let average_cost = if open_quantity > 0 {
            (total_remaining_cost / Decimal::from(open_quantity)).round_dp(ROUNDING_SCALE)
        } else {
            Decimal::ZERO
        };

        let open_lots = lots
            .iter()
            .map(|lot| OpenLotSummary {
                lot_id: lot.id.clone(),
                purchase_date: lot.purchase_date,
                quantity: lot.quantity,
                remaining_quantity: lot.remaining_quantity,
                unit_cost: lot.unit_cost().round_dp(ROUNDING_SCALE),
                remaining_cost: remaining_cost(lot),
            })
            .collect();

        debug!(
            "Cost basis for {}: {} shares at average {}",
            group, open_quantity, average_cost
        );
        Ok(CostBasisReport {
            group: group.clone(),
            open_quantity,
            average_cost,
            total_remaining_cost,
            open_lots,
        })
    }
}
