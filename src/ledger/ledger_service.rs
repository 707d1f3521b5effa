use dashmap::DashMap;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::{DbPool, DbTransactionExecutor};
use crate::ledger::fifo::match_fifo;
use crate::ledger::ledger_model::{
    GroupKey, GroupRebuildOutcome, RebuildReport, RebuildSummary, RecordedTransaction,
    ShortfallWarning,
};
use crate::ledger::replay::{replay_group, sell_breakdown};
use crate::ledger::LedgerServiceTrait;
use crate::lots::{LotRepository, PurchaseLot};
use crate::transactions::{NewTransaction, TradeSide, TransactionRepository};
use crate::Result;

/// Service owning all ledger mutations: the transaction entry API and the
/// operator rebuild. Every mutation runs inside one database transaction
/// and under the affected group's lock, so lot state and `calculated_pl`
/// can never diverge.
pub struct LedgerService {
    pool: Arc<DbPool>,
    transaction_repository: Arc<TransactionRepository>,
    lot_repository: Arc<LotRepository>,
    group_locks: DashMap<GroupKey, Arc<Mutex<()>>>,
}

impl LedgerService {
    pub fn new(
        pool: Arc<DbPool>,
        transaction_repository: Arc<TransactionRepository>,
        lot_repository: Arc<LotRepository>,
    ) -> Self {
        Self {
            pool,
            transaction_repository,
            lot_repository,
            group_locks: DashMap::new(),
        }
    }

    /// Lock serializing all lot mutations within one group. Groups are
    /// independent, so locks are per group and never nested.
    fn group_lock(&self, group: &GroupKey) -> Arc<Mutex<()>> {
        self.group_locks
            .entry(group.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn rebuild_group_locked(&self, group: &GroupKey) -> Result<RebuildSummary> {
        self.pool.execute(|conn| {
            let deleted = self.lot_repository.delete_group_lots_tx(conn, group)?;
            debug!("Rebuild {}: deleted {} existing lots", group, deleted);

            let history = self.transaction_repository.list_for_group_tx(conn, group)?;
            let outcome = replay_group(&history)?;

            for lot in &outcome.lots {
                self.lot_repository.insert_lot_tx(conn, lot)?;
            }
            for (transaction_id, pl) in &outcome.pl_by_transaction {
                self.transaction_repository
                    .update_calculated_pl_tx(conn, transaction_id, *pl)?;
            }

            Ok(RebuildSummary {
                group: group.clone(),
                lots_created: outcome.lots.len(),
                transactions_recalculated: outcome.pl_by_transaction.len(),
                warnings: outcome.warnings,
            })
        })
    }
}

#[async_trait::async_trait]
impl LedgerServiceTrait for LedgerService {
    /// Records one new trade and returns it with its computed P&L.
    ///
    /// BUY creates a lot and is always P&L neutral. SELL consumes open lots
    /// FIFO; if the group cannot cover the quantity, the sell still goes
    /// through with partial COGS and the shortfall is returned and logged.
    async fn record_transaction(
        &self,
        new_transaction: NewTransaction,
    ) -> Result<RecordedTransaction> {
        new_transaction.validate()?;

        let group = GroupKey::new(
            new_transaction.owner_id.clone(),
            new_transaction.account_id.clone(),
            new_transaction.ticker.clone(),
        );
        let lock = self.group_lock(&group);
        let _guard = lock.lock().await;

        self.pool.execute(|conn| {
            let seq = self.transaction_repository.next_seq_tx(conn)?;
            let mut transaction =
                self.transaction_repository
                    .insert_new_tx(conn, &new_transaction, seq)?;

            match transaction.side {
                TradeSide::Buy => {
                    let lot = PurchaseLot::from_buy(&transaction)?;
                    self.lot_repository.insert_lot_tx(conn, &lot)?;
                    debug!(
                        "Recorded BUY {} for {}: lot {} ({} shares)",
                        transaction.id, group, lot.id, lot.quantity
                    );
                    Ok(RecordedTransaction {
                        transaction,
                        warning: None,
                    })
                }
                TradeSide::Sell => {
                    let open = self.lot_repository.list_open_lots_tx(conn, &group)?;
                    let matched = match_fifo(transaction.quantity, &open);

                    for consumption in &matched.consumed {
                        self.lot_repository.decrement_lot_tx(
                            conn,
                            &consumption.lot_id,
                            consumption.consumed,
                        )?;
                    }

                    let breakdown = sell_breakdown(
                        transaction.quantity,
                        transaction.unit_price,
                        transaction.fee,
                        transaction.tax_rate,
                        matched.cogs,
                    );
                    self.transaction_repository.update_calculated_pl_tx(
                        conn,
                        &transaction.id,
                        breakdown.realized_pl,
                    )?;
                    transaction.calculated_pl = breakdown.realized_pl;

                    let warning = if matched.shortfall > 0 {
                        warn!(
                            "Sell {} for {} requested {} but only {} matched ({} unmatched)",
                            transaction.id,
                            group,
                            transaction.quantity,
                            matched.matched_quantity,
                            matched.shortfall
                        );
                        Some(ShortfallWarning {
                            transaction_id: transaction.id.clone(),
                            requested_quantity: transaction.quantity,
                            matched_quantity: matched.matched_quantity,
                            unmatched_quantity: matched.shortfall,
                        })
                    } else {
                        None
                    };

                    debug!(
                        "Recorded SELL {} for {}: COGS {}, realized P&L {}",
                        transaction.id, group, breakdown.cogs, breakdown.realized_pl
                    );
                    Ok(RecordedTransaction {
                        transaction,
                        warning,
                    })
                }
            }
        })
    }

    /// Deletes and regenerates all lots for one group by replaying its full
    /// history. The only supported way to correct backdated entries.
    async fn rebuild_group(&self, group: &GroupKey) -> Result<RebuildSummary> {
        let lock = self.group_lock(group);
        let _guard = lock.lock().await;

        let summary = self.rebuild_group_locked(group)?;
        info!(
            "Rebuilt {}: {} lots, {} transactions recalculated, {} warnings",
            group,
            summary.lots_created,
            summary.transactions_recalculated,
            summary.warnings.len()
        );
        Ok(summary)
    }

    /// Rebuilds every group, reporting per-group success and failure
    /// instead of failing fast. Groups share no state, so one group's
    /// failure leaves the others intact.
    async fn rebuild_all(&self) -> Result<RebuildReport> {
        let groups = self.transaction_repository.list_groups()?;
        info!("Rebuilding cost basis for {} groups", groups.len());

        let mut report = RebuildReport::default();
        for group in groups {
            match self.rebuild_group(&group).await {
                Ok(summary) => report.push(GroupRebuildOutcome::Ok(summary)),
                Err(e) => {
                    error!("Rebuild failed for {}: {}", group, e);
                    report.push(GroupRebuildOutcome::Failed {
                        group,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Rebuild complete: {} groups ok, {} failed, {} lots created, {} transactions recalculated",
            report.groups_processed,
            report.groups_failed,
            report.lots_created,
            report.transactions_recalculated
        );
        Ok(report)
    }
}
