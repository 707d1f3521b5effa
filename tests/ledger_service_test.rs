use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tradelog_core::db::{DbPool, DbTransactionExecutor};
use tradelog_core::errors::Error;
use tradelog_core::ledger::{GroupKey, LedgerService, LedgerServiceTrait};
use tradelog_core::lots::{LotError, LotRepository};
use tradelog_core::reporting::{ReportingService, ReportingServiceTrait};
use tradelog_core::transactions::{
    NewTransaction, TradeSide, TransactionRepository,
};

mod common;

struct TestContext {
    ledger: LedgerService,
    reporting: ReportingService,
    transactions: Arc<TransactionRepository>,
    lots: Arc<LotRepository>,
}

fn build_context(pool: Arc<DbPool>) -> TestContext {
    let transactions = Arc::new(TransactionRepository::new(pool.clone()));
    let lots = Arc::new(LotRepository::new(pool.clone()));
    TestContext {
        ledger: LedgerService::new(pool, transactions.clone(), lots.clone()),
        reporting: ReportingService::new(lots.clone()),
        transactions,
        lots,
    }
}

fn new_tx(
    ticker: &str,
    side: TradeSide,
    date: &str,
    quantity: i64,
    unit_price: Decimal,
    fee: Decimal,
    tax_rate: Decimal,
) -> NewTransaction {
    NewTransaction {
        id: None,
        owner_id: "user-1".to_string(),
        account_id: "acct-1".to_string(),
        ticker: ticker.to_string(),
        side,
        trade_date: date.to_string(),
        quantity,
        unit_price,
        fee,
        tax_rate,
        note: None,
    }
}

fn group(ticker: &str) -> GroupKey {
    GroupKey::new("user-1", "acct-1", ticker)
}

async fn record_worked_example(ctx: &TestContext, ticker: &str) {
    ctx.ledger
        .record_transaction(new_tx(
            ticker,
            TradeSide::Buy,
            "2024-03-01",
            1000,
            dec!(20000),
            dec!(50000),
            dec!(0),
        ))
        .await
        .unwrap();
    ctx.ledger
        .record_transaction(new_tx(
            ticker,
            TradeSide::Buy,
            "2024-03-02",
            500,
            dec!(22000),
            dec!(30000),
            dec!(0),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn buy_is_pl_neutral_and_opens_a_lot() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);

    let recorded = ctx
        .ledger
        .record_transaction(new_tx(
            "AAPL",
            TradeSide::Buy,
            "2024-03-01",
            10,
            dec!(150),
            dec!(1),
            dec!(0),
        ))
        .await
        .unwrap();

    assert_eq!(recorded.transaction.calculated_pl, dec!(0));
    assert!(recorded.warning.is_none());

    let open = ctx.lots.list_open_lots(&group("AAPL")).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].remaining_quantity, 10);
    assert_eq!(open[0].total_cost, dec!(1501));
}

#[tokio::test]
async fn sell_computes_fifo_realized_pl() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);
    record_worked_example(&ctx, "SSNLF").await;

    let recorded = ctx
        .ledger
        .record_transaction(new_tx(
            "SSNLF",
            TradeSide::Sell,
            "2024-03-03",
            1200,
            dec!(25000),
            dec!(40000),
            dec!(0.1),
        ))
        .await
        .unwrap();

    assert_eq!(recorded.transaction.calculated_pl, dec!(5468000));
    assert!(recorded.warning.is_none());

    // Oldest lot drained, 300 left on the newer one
    let open = ctx.lots.list_open_lots(&group("SSNLF")).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].quantity, 500);
    assert_eq!(open[0].remaining_quantity, 300);

    // Stored P&L matches what the call returned
    let stored = ctx
        .transactions
        .get_transaction(&recorded.transaction.id)
        .unwrap();
    assert_eq!(stored.calculated_pl, dec!(5468000));
}

#[tokio::test]
async fn average_cost_reflects_remaining_shares() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);
    record_worked_example(&ctx, "SSNLF").await;

    ctx.ledger
        .record_transaction(new_tx(
            "SSNLF",
            TradeSide::Sell,
            "2024-03-03",
            1200,
            dec!(25000),
            dec!(40000),
            dec!(0.1),
        ))
        .await
        .unwrap();

    let report = ctx.reporting.cost_basis(&group("SSNLF")).unwrap();
    assert_eq!(report.open_quantity, 300);
    // 300 remaining of lot B: 11,030,000 * 300/500 = 6,618,000
    assert_eq!(report.total_remaining_cost, dec!(6618000));
    assert_eq!(report.average_cost, dec!(22060));
    assert_eq!(report.open_lots.len(), 1);
}

#[tokio::test]
async fn empty_group_reports_zero_average_cost() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);

    let report = ctx.reporting.cost_basis(&group("NOPE")).unwrap();
    assert_eq!(report.open_quantity, 0);
    assert_eq!(report.average_cost, dec!(0));
    assert!(report.open_lots.is_empty());
}

#[tokio::test]
async fn sell_without_lots_surfaces_shortfall() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);

    let recorded = ctx
        .ledger
        .record_transaction(new_tx(
            "GME",
            TradeSide::Sell,
            "2024-03-01",
            100,
            dec!(1000),
            dec!(10),
            dec!(0.1),
        ))
        .await
        .unwrap();

    let warning = recorded.warning.expect("shortfall warning");
    assert_eq!(warning.unmatched_quantity, 100);
    assert_eq!(warning.matched_quantity, 0);
    // COGS 0: P&L equals net proceeds, 100,000 - 10 - 100
    assert_eq!(recorded.transaction.calculated_pl, dec!(99890));
}

#[tokio::test]
async fn entry_api_rejects_invalid_input() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);

    let mut bad = new_tx("AAPL", TradeSide::Buy, "2024-03-01", 10, dec!(1), dec!(0), dec!(0));
    bad.quantity = 0;
    assert!(ctx.ledger.record_transaction(bad).await.is_err());

    let mut bad_date = new_tx("AAPL", TradeSide::Buy, "bad", 10, dec!(1), dec!(0), dec!(0));
    bad_date.trade_date = "03/01/2024".to_string();
    assert!(ctx.ledger.record_transaction(bad_date).await.is_err());

    // Nothing persisted
    assert!(ctx
        .transactions
        .list_for_group(&group("AAPL"))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn rebuild_is_idempotent() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);
    record_worked_example(&ctx, "SSNLF").await;
    ctx.ledger
        .record_transaction(new_tx(
            "SSNLF",
            TradeSide::Sell,
            "2024-03-03",
            1200,
            dec!(25000),
            dec!(40000),
            dec!(0.1),
        ))
        .await
        .unwrap();

    let g = group("SSNLF");
    let lot_state = |lots: &[tradelog_core::lots::PurchaseLot]| {
        lots.iter()
            .map(|l| (l.purchase_date, l.quantity, l.remaining_quantity, l.total_cost))
            .collect::<Vec<_>>()
    };

    let first = ctx.ledger.rebuild_group(&g).await.unwrap();
    let lots_after_first = lot_state(&ctx.lots.list_open_lots(&g).unwrap());
    let pl_after_first: Vec<_> = ctx
        .transactions
        .list_for_group(&g)
        .unwrap()
        .iter()
        .map(|t| t.calculated_pl)
        .collect();

    let second = ctx.ledger.rebuild_group(&g).await.unwrap();
    let lots_after_second = lot_state(&ctx.lots.list_open_lots(&g).unwrap());
    let pl_after_second: Vec<_> = ctx
        .transactions
        .list_for_group(&g)
        .unwrap()
        .iter()
        .map(|t| t.calculated_pl)
        .collect();

    assert_eq!(first.lots_created, 2);
    assert_eq!(first.transactions_recalculated, 3);
    assert_eq!(second.lots_created, first.lots_created);
    assert_eq!(lots_after_first, lots_after_second);
    assert_eq!(pl_after_first, pl_after_second);
    assert_eq!(pl_after_first, vec![dec!(0), dec!(0), dec!(5468000)]);
}

#[tokio::test]
async fn rebuild_recovers_backdated_entries() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);

    // Sell entered before the backdated buy it should consume
    let sell = ctx
        .ledger
        .record_transaction(new_tx(
            "SSNLF",
            TradeSide::Sell,
            "2024-03-05",
            100,
            dec!(25000),
            dec!(0),
            dec!(0),
        ))
        .await
        .unwrap();
    assert!(sell.warning.is_some());

    ctx.ledger
        .record_transaction(new_tx(
            "SSNLF",
            TradeSide::Buy,
            "2024-03-01",
            100,
            dec!(20000),
            dec!(0),
            dec!(0),
        ))
        .await
        .unwrap();

    let g = group("SSNLF");
    let summary = ctx.ledger.rebuild_group(&g).await.unwrap();
    assert!(summary.warnings.is_empty());

    let stored = ctx.transactions.get_transaction(&sell.transaction.id).unwrap();
    assert_eq!(stored.calculated_pl, dec!(500000));
    assert!(ctx.lots.list_open_lots(&g).unwrap().is_empty());
}

#[tokio::test]
async fn rebuild_all_reports_per_group_counts() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);
    record_worked_example(&ctx, "SSNLF").await;
    ctx.ledger
        .record_transaction(new_tx(
            "AAPL",
            TradeSide::Buy,
            "2024-03-01",
            10,
            dec!(150),
            dec!(0),
            dec!(0),
        ))
        .await
        .unwrap();

    let report = ctx.ledger.rebuild_all().await.unwrap();
    assert_eq!(report.groups_processed, 2);
    assert_eq!(report.groups_failed, 0);
    assert_eq!(report.lots_created, 3);
    assert_eq!(report.transactions_recalculated, 3);
}

#[tokio::test]
async fn over_decrement_rolls_back_the_whole_transaction() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool.clone());
    ctx.ledger
        .record_transaction(new_tx(
            "AAPL",
            TradeSide::Buy,
            "2024-03-01",
            10,
            dec!(150),
            dec!(0),
            dec!(0),
        ))
        .await
        .unwrap();

    let g = group("AAPL");
    let lot_id = ctx.lots.list_open_lots(&g).unwrap()[0].id.clone();

    let result: tradelog_core::Result<()> = pool.execute(|conn| {
        // A sibling write in the same atomic boundary, then the violation
        ctx.lots.decrement_lot_tx(conn, &lot_id, 4)?;
        ctx.lots.decrement_lot_tx(conn, &lot_id, 100)?;
        Ok(())
    });

    match result {
        Err(Error::Lot(LotError::InvariantViolation {
            requested,
            remaining,
            ..
        })) => {
            // The first decrement was visible inside the transaction
            assert_eq!(requested, 100);
            assert_eq!(remaining, 6);
        }
        other => panic!("expected invariant violation, got {:?}", other),
    }

    // Both decrements rolled back: no partial writes survive
    let open = ctx.lots.list_open_lots(&g).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].remaining_quantity, 10);
}

#[tokio::test]
async fn delete_all_lots_resets_the_store() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool.clone());
    record_worked_example(&ctx, "SSNLF").await;
    record_worked_example(&ctx, "AAPL").await;

    let deleted = pool
        .execute(|conn| Ok(ctx.lots.delete_all_lots_tx(conn)?))
        .unwrap();

    assert_eq!(deleted, 4);
    assert!(ctx.lots.list_open_lots(&group("SSNLF")).unwrap().is_empty());
    assert!(ctx.lots.list_open_lots(&group("AAPL")).unwrap().is_empty());
}

#[tokio::test]
async fn rebuild_leaves_other_groups_untouched() {
    let (_dir, pool) = common::setup_pool();
    let ctx = build_context(pool);
    record_worked_example(&ctx, "SSNLF").await;
    ctx.ledger
        .record_transaction(new_tx(
            "AAPL",
            TradeSide::Buy,
            "2024-03-01",
            10,
            dec!(150),
            dec!(0),
            dec!(0),
        ))
        .await
        .unwrap();

    let other_before = ctx.lots.list_open_lots(&group("AAPL")).unwrap();
    ctx.ledger.rebuild_group(&group("SSNLF")).await.unwrap();
    let other_after = ctx.lots.list_open_lots(&group("AAPL")).unwrap();

    // Same lot rows, same ids: the other group was never touched
    assert_eq!(
        other_before.iter().map(|l| l.id.clone()).collect::<Vec<_>>(),
        other_after.iter().map(|l| l.id.clone()).collect::<Vec<_>>()
    );
}
