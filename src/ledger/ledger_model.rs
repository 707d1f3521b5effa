use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope of all FIFO state. Groups never interact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    pub owner_id: String,
    pub account_id: String,
    pub ticker: String,
}

impl GroupKey {
    pub fn new(
        owner_id: impl Into<String>,
        account_id: impl Into<String>,
        ticker: impl Into<String>,
    ) -> Self {
        GroupKey {
            owner_id: owner_id.into(),
            account_id: account_id.into(),
            ticker: ticker.into(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner_id, self.account_id, self.ticker)
    }
}

/// Raised when a sell asks for more quantity than the group's open lots
/// hold. Non-fatal: matching proceeds with what exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortfallWarning {
    pub transaction_id: String,
    pub requested_quantity: i64,
    pub matched_quantity: i64,
    pub unmatched_quantity: i64,
}

/// Outcome of rebuilding a single group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildSummary {
    pub group: GroupKey,
    pub lots_created: usize,
    pub transactions_recalculated: usize,
    pub warnings: Vec<ShortfallWarning>,
}

/// Per-group result line inside a full rebuild report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "status")]
pub enum GroupRebuildOutcome {
    Ok(RebuildSummary),
    Failed { group: GroupKey, message: String },
}

/// Aggregate report for an all-groups rebuild.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub groups_processed: usize,
    pub groups_failed: usize,
    pub lots_created: usize,
    pub transactions_recalculated: usize,
    pub outcomes: Vec<GroupRebuildOutcome>,
}

impl RebuildReport {
    pub fn push(&mut self, outcome: GroupRebuildOutcome) {
        match &outcome {
            GroupRebuildOutcome::Ok(summary) => {
                self.groups_processed += 1;
                self.lots_created += summary.lots_created;
                self.transactions_recalculated += summary.transactions_recalculated;
            }
            GroupRebuildOutcome::Failed { .. } => {
                self.groups_failed += 1;
            }
        }
        self.outcomes.push(outcome);
    }
}

/// Result of recording a single transaction through the entry API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedTransaction {
    pub transaction: crate::transactions::Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<ShortfallWarning>,
}

/// Realized P&L figures for one sell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellBreakdown {
    pub gross_proceeds: Decimal,
    pub selling_tax: Decimal,
    pub net_proceeds: Decimal,
    pub cogs: Decimal,
    pub realized_pl: Decimal,
}
