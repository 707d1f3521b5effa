//! Pure replay of one group's chronological transaction stream into lots
//! and realized P&L. Both the entry path and the operator rebuild sit on
//! top of this; it touches no storage.

use log::warn;
use rust_decimal::Decimal;

use crate::ledger::fifo::{match_fifo, LotConsumption};
use crate::ledger::ledger_errors::{LedgerError, Result};
use crate::ledger::ledger_model::{SellBreakdown, ShortfallWarning};
use crate::lots::{PurchaseLot, ROUNDING_SCALE};
use crate::transactions::{TradeSide, Transaction};

/// Everything a replay produced for one group, ready to persist.
#[derive(Debug, Clone, Default)]
pub struct ReplayOutcome {
    /// Final lot state, FIFO order, remaining quantities applied.
    pub lots: Vec<PurchaseLot>,
    /// `(transaction id, calculated P&L)` for every replayed transaction.
    pub pl_by_transaction: Vec<(String, Decimal)>,
    pub warnings: Vec<ShortfallWarning>,
}

/// Net-proceeds arithmetic for one sell: tax applies to gross proceeds,
/// fee is absolute, unmatched quantity contributes zero COGS.
pub fn sell_breakdown(
    quantity: i64,
    unit_price: Decimal,
    fee: Decimal,
    tax_rate: Decimal,
    cogs: Decimal,
) -> SellBreakdown {
    let gross_proceeds = unit_price * Decimal::from(quantity);
    let selling_tax = (gross_proceeds * tax_rate / Decimal::ONE_HUNDRED).round_dp(ROUNDING_SCALE);
    let net_proceeds = gross_proceeds - fee - selling_tax;
    let realized_pl = (net_proceeds - cogs).round_dp(ROUNDING_SCALE);

    SellBreakdown {
        gross_proceeds,
        selling_tax,
        net_proceeds,
        cogs,
        realized_pl,
    }
}

/// Replays a group's full history and returns the regenerated lots plus
/// the P&L of every transaction.
///
/// The input is re-sorted by (trade date, insertion sequence) so callers
/// cannot depend on storage ordering. Processing is deterministic: the
/// same history always yields the same lots and the same P&L values.
pub fn replay_group(transactions: &[Transaction]) -> Result<ReplayOutcome> {
    let mut ordered: Vec<&Transaction> = transactions.iter().collect();
    ordered.sort_by(|a, b| {
        a.trade_date
            .cmp(&b.trade_date)
            .then_with(|| a.seq.cmp(&b.seq))
    });

    let mut outcome = ReplayOutcome::default();

    for tx in ordered {
        match tx.side {
            TradeSide::Buy => {
                let lot = PurchaseLot::from_buy(tx)?;
                outcome.lots.push(lot);
                outcome.pl_by_transaction.push((tx.id.clone(), Decimal::ZERO));
            }
            TradeSide::Sell => {
                let matched = {
                    let open: Vec<PurchaseLot> = outcome
                        .lots
                        .iter()
                        .filter(|lot| lot.remaining_quantity > 0)
                        .cloned()
                        .collect();
                    match_fifo(tx.quantity, &open)
                };

                apply_consumptions(&mut outcome.lots, &matched.consumed)?;

                if matched.shortfall > 0 {
                    warn!(
                        "Sell {} for {}/{}/{} requested {} but only {} matched ({} unmatched)",
                        tx.id,
                        tx.owner_id,
                        tx.account_id,
                        tx.ticker,
                        tx.quantity,
                        matched.matched_quantity,
                        matched.shortfall
                    );
                    outcome.warnings.push(ShortfallWarning {
                        transaction_id: tx.id.clone(),
                        requested_quantity: tx.quantity,
                        matched_quantity: matched.matched_quantity,
                        unmatched_quantity: matched.shortfall,
                    });
                }

                let breakdown =
                    sell_breakdown(tx.quantity, tx.unit_price, tx.fee, tx.tax_rate, matched.cogs);
                outcome
                    .pl_by_transaction
                    .push((tx.id.clone(), breakdown.realized_pl));
            }
        }
    }

    Ok(outcome)
}

fn apply_consumptions(lots: &mut [PurchaseLot], consumed: &[LotConsumption]) -> Result<()> {
    for consumption in consumed {
        let lot = lots
            .iter_mut()
            .find(|lot| lot.id == consumption.lot_id)
            .ok_or_else(|| {
                LedgerError::InvalidData(format!(
                    "Matcher referenced unknown lot {}",
                    consumption.lot_id
                ))
            })?;
        if consumption.consumed > lot.remaining_quantity {
            return Err(LedgerError::Lot(crate::lots::LotError::InvariantViolation {
                lot_id: lot.id.clone(),
                requested: consumption.consumed,
                remaining: lot.remaining_quantity,
            }));
        }
        lot.remaining_quantity -= consumption.consumed;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn tx(
        id: &str,
        side: TradeSide,
        day: u32,
        seq: i64,
        quantity: i64,
        unit_price: Decimal,
        fee: Decimal,
        tax_rate: Decimal,
    ) -> Transaction {
        Transaction {
            id: id.to_string(),
            owner_id: "user-1".to_string(),
            account_id: "acct-1".to_string(),
            ticker: "SSNLF".to_string(),
            side,
            trade_date: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            seq,
            quantity,
            unit_price,
            fee,
            tax_rate,
            calculated_pl: dec!(0),
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn worked_example() -> Vec<Transaction> {
        vec![
            tx("buy-a", TradeSide::Buy, 1, 1, 1000, dec!(20000), dec!(50000), dec!(0)),
            tx("buy-b", TradeSide::Buy, 2, 2, 500, dec!(22000), dec!(30000), dec!(0)),
            tx("sell-1", TradeSide::Sell, 3, 3, 1200, dec!(25000), dec!(40000), dec!(0.1)),
        ]
    }

    #[test]
    fn buy_is_pl_neutral_and_creates_one_lot() {
        let outcome = replay_group(&[tx(
            "buy-a",
            TradeSide::Buy,
            1,
            1,
            1000,
            dec!(20000),
            dec!(50000),
            dec!(0),
        )])
        .unwrap();

        assert_eq!(outcome.lots.len(), 1);
        assert_eq!(outcome.lots[0].remaining_quantity, 1000);
        assert_eq!(outcome.pl_by_transaction, vec![("buy-a".to_string(), dec!(0))]);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn worked_example_realized_pl() {
        let outcome = replay_group(&worked_example()).unwrap();

        // COGS 24,462,000; net proceeds 29,930,000; realized P&L 5,468,000
        let (id, pl) = &outcome.pl_by_transaction[2];
        assert_eq!(id, "sell-1");
        assert_eq!(*pl, dec!(5468000));

        assert_eq!(outcome.lots[0].remaining_quantity, 0);
        assert_eq!(outcome.lots[1].remaining_quantity, 300);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn conservation_of_quantity() {
        let outcome = replay_group(&worked_example()).unwrap();
        let open: i64 = outcome.lots.iter().map(|l| l.remaining_quantity).sum();
        assert_eq!(open, 1500 - 1200);
    }

    #[test]
    fn sell_with_no_lots_computes_pl_from_net_proceeds() {
        let outcome = replay_group(&[tx(
            "sell-orphan",
            TradeSide::Sell,
            1,
            1,
            100,
            dec!(1000),
            dec!(10),
            dec!(0.1),
        )])
        .unwrap();

        // gross 100,000; tax 100; net 99,890; COGS 0
        assert_eq!(outcome.pl_by_transaction[0].1, dec!(99890));
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].unmatched_quantity, 100);
        assert!(outcome.lots.is_empty());
    }

    #[test]
    fn replay_is_deterministic() {
        let first = replay_group(&worked_example()).unwrap();
        let second = replay_group(&worked_example()).unwrap();

        assert_eq!(first.pl_by_transaction, second.pl_by_transaction);
        let remaining =
            |o: &ReplayOutcome| o.lots.iter().map(|l| l.remaining_quantity).collect::<Vec<_>>();
        assert_eq!(remaining(&first), remaining(&second));
    }

    #[test]
    fn backdated_input_is_resorted_before_replay() {
        let mut history = worked_example();
        history.reverse();
        let outcome = replay_group(&history).unwrap();

        assert_eq!(outcome.pl_by_transaction.last().unwrap().1, dec!(5468000));
    }

    #[test]
    fn unit_cost_stable_across_multiple_sells() {
        let history = vec![
            tx("buy-a", TradeSide::Buy, 1, 1, 500, dec!(22000), dec!(30000), dec!(0)),
            tx("sell-1", TradeSide::Sell, 2, 2, 200, dec!(25000), dec!(0), dec!(0)),
            tx("sell-2", TradeSide::Sell, 3, 3, 200, dec!(25000), dec!(0), dec!(0)),
        ];
        let outcome = replay_group(&history).unwrap();

        // Each sell costs 200 * 22,060 = 4,412,000 against 5,000,000 gross
        assert_eq!(outcome.pl_by_transaction[1].1, dec!(588000));
        assert_eq!(outcome.pl_by_transaction[2].1, dec!(588000));
        assert_eq!(outcome.lots[0].remaining_quantity, 100);
    }
}
