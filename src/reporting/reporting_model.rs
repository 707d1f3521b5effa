use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::GroupKey;

/// Summary of one open lot, for portfolio display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenLotSummary {
    pub lot_id: String,
    pub purchase_date: DateTime<Utc>,
    pub quantity: i64,
    pub remaining_quantity: i64,
    pub unit_cost: Decimal,
    /// Cost basis of the shares still held in this lot.
    pub remaining_cost: Decimal,
}

/// Current cost basis of a group's remaining shares.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBasisReport {
    pub group: GroupKey,
    pub open_quantity: i64,
    /// Weighted-average cost per remaining share, buy fees included.
    /// Zero when nothing is held.
    pub average_cost: Decimal,
    pub total_remaining_cost: Decimal,
    pub open_lots: Vec<OpenLotSummary>,
}
