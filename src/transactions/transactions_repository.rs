use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{get_connection, DbPool};
use crate::ledger::GroupKey;
use crate::schema::transactions;
use crate::transactions::transactions_errors::{Result, TransactionError};
use crate::transactions::transactions_model::{NewTransaction, Transaction, TransactionDB};

/// Repository for trade transactions
pub struct TransactionRepository {
    pool: Arc<DbPool>,
}

impl TransactionRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn get_transaction(&self, transaction_id: &str) -> Result<Transaction> {
        let mut conn = get_connection(&self.pool)
            .map_err(|e| TransactionError::DatabaseError(e.to_string()))?;

        transactions::table
            .find(transaction_id)
            .select(TransactionDB::as_select())
            .first::<TransactionDB>(&mut conn)
            .map_err(TransactionError::from)
            .and_then(Transaction::try_from)
    }

    /// Full chronological history of one group: trade date ascending,
    /// insertion sequence as the stable tie-break. This is the replay order.
    pub fn list_for_group(&self, group: &GroupKey) -> Result<Vec<Transaction>> {
        let mut conn = get_connection(&self.pool)
            .map_err(|e| TransactionError::DatabaseError(e.to_string()))?;
        Self::list_for_group_query(&mut conn, group)
    }

    /// In-transaction variant of [`Self::list_for_group`].
    pub fn list_for_group_tx(
        &self,
        conn: &mut SqliteConnection,
        group: &GroupKey,
    ) -> Result<Vec<Transaction>> {
        Self::list_for_group_query(conn, group)
    }

    fn list_for_group_query(
        conn: &mut SqliteConnection,
        group: &GroupKey,
    ) -> Result<Vec<Transaction>> {
        transactions::table
            .filter(transactions::owner_id.eq(&group.owner_id))
            .filter(transactions::account_id.eq(&group.account_id))
            .filter(transactions::ticker.eq(&group.ticker))
            .order((transactions::trade_date.asc(), transactions::seq.asc()))
            .select(TransactionDB::as_select())
            .load::<TransactionDB>(conn)
            .map_err(TransactionError::from)?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    /// Every distinct (owner, account, ticker) group with recorded trades.
    pub fn list_groups(&self) -> Result<Vec<GroupKey>> {
        let mut conn = get_connection(&self.pool)
            .map_err(|e| TransactionError::DatabaseError(e.to_string()))?;

        let rows: Vec<(String, String, String)> = transactions::table
            .select((
                transactions::owner_id,
                transactions::account_id,
                transactions::ticker,
            ))
            .distinct()
            .order((
                transactions::owner_id.asc(),
                transactions::account_id.asc(),
                transactions::ticker.asc(),
            ))
            .load(&mut conn)
            .map_err(TransactionError::from)?;

        Ok(rows
            .into_iter()
            .map(|(owner_id, account_id, ticker)| GroupKey {
                owner_id,
                account_id,
                ticker,
            })
            .collect())
    }

    /// Next value of the global insertion sequence.
    pub fn next_seq_tx(&self, conn: &mut SqliteConnection) -> Result<i64> {
        use diesel::dsl::max;

        let current: Option<i64> = transactions::table
            .select(max(transactions::seq))
            .first(conn)
            .map_err(TransactionError::from)?;
        Ok(current.unwrap_or(0) + 1)
    }

    /// Inserts a validated new transaction and returns the stored record.
    pub fn insert_new_tx(
        &self,
        conn: &mut SqliteConnection,
        new_transaction: &NewTransaction,
        seq: i64,
    ) -> Result<Transaction> {
        let trade_date = new_transaction.parse_trade_date()?;
        let now = Utc::now().naive_utc();

        let record = TransactionDB {
            id: new_transaction
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            owner_id: new_transaction.owner_id.clone(),
            account_id: new_transaction.account_id.clone(),
            ticker: new_transaction.ticker.clone(),
            side: new_transaction.side.as_str().to_string(),
            trade_date: trade_date.naive_utc(),
            seq,
            quantity: new_transaction.quantity,
            unit_price: new_transaction.unit_price.to_string(),
            fee: new_transaction.fee.to_string(),
            tax_rate: new_transaction.tax_rate.to_string(),
            calculated_pl: Decimal::ZERO.to_string(),
            note: new_transaction.note.clone(),
            created_at: now,
            updated_at: now,
        };

        diesel::insert_into(transactions::table)
            .values(&record)
            .execute(conn)
            .map_err(TransactionError::from)?;

        Transaction::try_from(record)
    }

    /// Writes back the realized P&L computed by a replay.
    pub fn update_calculated_pl_tx(
        &self,
        conn: &mut SqliteConnection,
        transaction_id: &str,
        calculated_pl: Decimal,
    ) -> Result<()> {
        diesel::update(transactions::table.find(transaction_id))
            .set((
                transactions::calculated_pl.eq(calculated_pl.to_string()),
                transactions::updated_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)
            .map_err(TransactionError::from)?;
        Ok(())
    }
}
