//! Pure FIFO matcher: decides how a sell quantity is satisfied by the
//! ordered open lots of one group and what the consumed shares cost.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lots::{PurchaseLot, ROUNDING_SCALE};

/// One lot's share of a sell, for the audit trail and the write-back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotConsumption {
    pub lot_id: String,
    pub consumed: i64,
    /// Cost basis of the consumed shares at the lot's original unit cost.
    pub cost: Decimal,
}

/// Result of matching one sell against a group's open lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub cogs: Decimal,
    pub matched_quantity: i64,
    /// Quantity the open lots could not cover. Zero in consistent data.
    pub shortfall: i64,
    pub consumed: Vec<LotConsumption>,
}

/// Consumes `sell_quantity` shares from `open_lots`, oldest first.
///
/// Each lot is costed at `total_cost / quantity` of the *original* lot, so
/// partial consumption never changes a lot's unit economics. When the open
/// lots cannot cover the request the matcher takes what exists and reports
/// the shortfall; it never fabricates a lot.
pub fn match_fifo(sell_quantity: i64, open_lots: &[PurchaseLot]) -> MatchOutcome {
    let mut still_needed = sell_quantity.max(0);
    let mut cogs = Decimal::ZERO;
    let mut matched_quantity = 0;
    let mut consumed = Vec::new();

    for lot in open_lots {
        if still_needed == 0 {
            break;
        }
        if lot.remaining_quantity <= 0 {
            continue;
        }

        let take = lot.remaining_quantity.min(still_needed);
        let cost = (lot.unit_cost() * Decimal::from(take)).round_dp(ROUNDING_SCALE);

        cogs += cost;
        matched_quantity += take;
        still_needed -= take;
        consumed.push(LotConsumption {
            lot_id: lot.id.clone(),
            consumed: take,
            cost,
        });
    }

    MatchOutcome {
        cogs,
        matched_quantity,
        shortfall: still_needed,
        consumed,
    }
}
