use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::lots::lots_errors::{LotError, Result};
use crate::transactions::{TradeSide, Transaction};

pub const ROUNDING_SCALE: u32 = 8;

/// Domain model for a purchase lot: the shares acquired by one BUY,
/// tracked until fully consumed by later sells.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLot {
    pub id: String,
    pub transaction_id: String,
    pub owner_id: String,
    pub account_id: String,
    pub ticker: String,
    pub purchase_date: DateTime<Utc>,
    /// Copied from the source transaction, tie-break for identical dates.
    pub seq: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub buy_fee: Decimal,
    /// `unit_price * quantity + buy_fee`, fixed at creation.
    pub total_cost: Decimal,
    pub remaining_quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl PurchaseLot {
    /// Builds a fresh lot from a BUY transaction.
    pub fn from_buy(tx: &Transaction) -> Result<Self> {
        if tx.side != TradeSide::Buy {
            return Err(LotError::InvalidData(format!(
                "Lot can only be created from a BUY transaction, got {} ({})",
                tx.side.as_str(),
                tx.id
            )));
        }
        let total_cost =
            (tx.unit_price * Decimal::from(tx.quantity) + tx.fee).round_dp(ROUNDING_SCALE);
        Ok(PurchaseLot {
            id: Uuid::new_v4().to_string(),
            transaction_id: tx.id.clone(),
            owner_id: tx.owner_id.clone(),
            account_id: tx.account_id.clone(),
            ticker: tx.ticker.clone(),
            purchase_date: tx.trade_date,
            seq: tx.seq,
            quantity: tx.quantity,
            unit_price: tx.unit_price,
            buy_fee: tx.fee,
            total_cost,
            remaining_quantity: tx.quantity,
            created_at: Utc::now(),
        })
    }

    /// Per-share cost of this lot, buy fee included. Always derived from
    /// the original quantity so partial consumption never changes it.
    pub fn unit_cost(&self) -> Decimal {
        if self.quantity == 0 {
            return Decimal::ZERO;
        }
        self.total_cost / Decimal::from(self.quantity)
    }
}

/// Database model for purchase lots
#[derive(Queryable, Selectable, Identifiable, Insertable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::purchase_lots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PurchaseLotDB {
    pub id: String,
    pub transaction_id: String,
    pub owner_id: String,
    pub account_id: String,
    pub ticker: String,
    pub purchase_date: NaiveDateTime,
    pub seq: i64,
    pub quantity: i64,
    pub unit_price: String,
    pub buy_fee: String,
    pub total_cost: String,
    pub remaining_quantity: i64,
    pub created_at: NaiveDateTime,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| LotError::InvalidData(format!("Invalid decimal in '{}': {}", field, e)))
}

impl TryFrom<PurchaseLotDB> for PurchaseLot {
    type Error = LotError;

    fn try_from(db: PurchaseLotDB) -> Result<Self> {
        Ok(PurchaseLot {
            unit_price: parse_decimal("unit_price", &db.unit_price)?,
            buy_fee: parse_decimal("buy_fee", &db.buy_fee)?,
            total_cost: parse_decimal("total_cost", &db.total_cost)?,
            id: db.id,
            transaction_id: db.transaction_id,
            owner_id: db.owner_id,
            account_id: db.account_id,
            ticker: db.ticker,
            purchase_date: DateTime::from_naive_utc_and_offset(db.purchase_date, Utc),
            seq: db.seq,
            quantity: db.quantity,
            remaining_quantity: db.remaining_quantity,
            created_at: DateTime::from_naive_utc_and_offset(db.created_at, Utc),
        })
    }
}

impl From<&PurchaseLot> for PurchaseLotDB {
    fn from(lot: &PurchaseLot) -> Self {
        PurchaseLotDB {
            id: lot.id.clone(),
            transaction_id: lot.transaction_id.clone(),
            owner_id: lot.owner_id.clone(),
            account_id: lot.account_id.clone(),
            ticker: lot.ticker.clone(),
            purchase_date: lot.purchase_date.naive_utc(),
            seq: lot.seq,
            quantity: lot.quantity,
            unit_price: lot.unit_price.to_string(),
            buy_fee: lot.buy_fee.to_string(),
            total_cost: lot.total_cost.to_string(),
            remaining_quantity: lot.remaining_quantity,
            created_at: lot.created_at.naive_utc(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn buy(quantity: i64, unit_price: Decimal, fee: Decimal) -> Transaction {
        Transaction {
            id: "tx-1".to_string(),
            owner_id: "user-1".to_string(),
            account_id: "acct-1".to_string(),
            ticker: "SSNLF".to_string(),
            side: TradeSide::Buy,
            trade_date: Utc::now(),
            seq: 1,
            quantity,
            unit_price,
            fee,
            tax_rate: dec!(0),
            calculated_pl: dec!(0),
            note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn from_buy_fixes_total_cost_including_fee() {
        let lot = PurchaseLot::from_buy(&buy(1000, dec!(20000), dec!(50000))).unwrap();
        assert_eq!(lot.total_cost, dec!(20050000));
        assert_eq!(lot.remaining_quantity, 1000);
        assert_eq!(lot.unit_cost(), dec!(20050));
    }

    #[test]
    fn from_buy_rejects_sell_side() {
        let mut tx = buy(10, dec!(100), dec!(0));
        tx.side = TradeSide::Sell;
        assert!(PurchaseLot::from_buy(&tx).is_err());
    }
}
