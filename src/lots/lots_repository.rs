use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use crate::db::{get_connection, DbPool};
use crate::ledger::GroupKey;
use crate::lots::lots_errors::{LotError, Result};
use crate::lots::lots_model::{PurchaseLot, PurchaseLotDB};
use crate::schema::purchase_lots;

/// Repository for purchase lots. Mutating methods take an explicit
/// connection so callers can scope them inside one database transaction
/// together with the P&L write-back.
pub struct LotRepository {
    pool: Arc<DbPool>,
}

impl LotRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Open lots for a group, oldest purchase first. This ordering is the
    /// FIFO queue: purchase date ascending, insertion sequence as tie-break.
    pub fn list_open_lots(&self, group: &GroupKey) -> Result<Vec<PurchaseLot>> {
        let mut conn =
            get_connection(&self.pool).map_err(|e| LotError::DatabaseError(e.to_string()))?;
        Self::list_open_lots_query(&mut conn, group)
    }

    /// In-transaction variant of [`Self::list_open_lots`].
    pub fn list_open_lots_tx(
        &self,
        conn: &mut SqliteConnection,
        group: &GroupKey,
    ) -> Result<Vec<PurchaseLot>> {
        Self::list_open_lots_query(conn, group)
    }

    fn list_open_lots_query(
        conn: &mut SqliteConnection,
        group: &GroupKey,
    ) -> Result<Vec<PurchaseLot>> {
        purchase_lots::table
            .filter(purchase_lots::owner_id.eq(&group.owner_id))
            .filter(purchase_lots::account_id.eq(&group.account_id))
            .filter(purchase_lots::ticker.eq(&group.ticker))
            .filter(purchase_lots::remaining_quantity.gt(0))
            .order((purchase_lots::purchase_date.asc(), purchase_lots::seq.asc()))
            .select(PurchaseLotDB::as_select())
            .load::<PurchaseLotDB>(conn)
            .map_err(LotError::from)?
            .into_iter()
            .map(PurchaseLot::try_from)
            .collect()
    }

    /// Persists a freshly created lot.
    pub fn insert_lot_tx(&self, conn: &mut SqliteConnection, lot: &PurchaseLot) -> Result<()> {
        diesel::insert_into(purchase_lots::table)
            .values(PurchaseLotDB::from(lot))
            .execute(conn)
            .map_err(LotError::from)?;
        Ok(())
    }

    /// Consumes `amount` shares from a lot. Refuses to take the remaining
    /// quantity below zero.
    pub fn decrement_lot_tx(
        &self,
        conn: &mut SqliteConnection,
        lot_id: &str,
        amount: i64,
    ) -> Result<()> {
        let remaining: i64 = purchase_lots::table
            .find(lot_id)
            .select(purchase_lots::remaining_quantity)
            .first(conn)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    LotError::NotFound(format!("Lot {} not found", lot_id))
                }
                other => LotError::from(other),
            })?;

        if amount <= 0 || amount > remaining {
            return Err(LotError::InvariantViolation {
                lot_id: lot_id.to_string(),
                requested: amount,
                remaining,
            });
        }

        diesel::update(purchase_lots::table.find(lot_id))
            .set(purchase_lots::remaining_quantity.eq(remaining - amount))
            .execute(conn)
            .map_err(LotError::from)?;
        Ok(())
    }

    /// Deletes every lot for one group. Rebuild path only.
    pub fn delete_group_lots_tx(
        &self,
        conn: &mut SqliteConnection,
        group: &GroupKey,
    ) -> Result<usize> {
        diesel::delete(
            purchase_lots::table
                .filter(purchase_lots::owner_id.eq(&group.owner_id))
                .filter(purchase_lots::account_id.eq(&group.account_id))
                .filter(purchase_lots::ticker.eq(&group.ticker)),
        )
        .execute(conn)
        .map_err(LotError::from)
    }

    /// Deletes every lot in the store. Full-rebuild/migration path only.
    pub fn delete_all_lots_tx(&self, conn: &mut SqliteConnection) -> Result<usize> {
        diesel::delete(purchase_lots::table)
            .execute(conn)
            .map_err(LotError::from)
    }
}
