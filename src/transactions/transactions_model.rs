use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::transactions::transactions_errors::{Result, TransactionError};

/// Which side of the trade a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl FromStr for TradeSide {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BUY" => Ok(TradeSide::Buy),
            "SELL" => Ok(TradeSide::Sell),
            other => Err(TransactionError::InvalidData(format!(
                "Unknown trade side '{}'",
                other
            ))),
        }
    }
}

/// Domain model representing a recorded trade
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub owner_id: String,
    pub account_id: String,
    pub ticker: String,
    pub side: TradeSide,
    pub trade_date: DateTime<Utc>,
    /// Stable insertion sequence, tie-break for identical trade dates.
    pub seq: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub fee: Decimal,
    /// Percentage applied to gross proceeds, SELL only.
    pub tax_rate: Decimal,
    pub calculated_pl: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database model for transactions
#[derive(Queryable, Selectable, Identifiable, Insertable, AsChangeset, PartialEq, Debug, Clone)]
#[diesel(table_name = crate::schema::transactions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct TransactionDB {
    pub id: String,
    pub owner_id: String,
    pub account_id: String,
    pub ticker: String,
    pub side: String,
    pub trade_date: NaiveDateTime,
    pub seq: i64,
    pub quantity: i64,
    pub unit_price: String,
    pub fee: String,
    pub tax_rate: String,
    pub calculated_pl: String,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| {
        TransactionError::InvalidData(format!("Invalid decimal in '{}': {}", field, e))
    })
}

impl TryFrom<TransactionDB> for Transaction {
    type Error = TransactionError;

    fn try_from(db: TransactionDB) -> Result<Self> {
        Ok(Transaction {
            side: TradeSide::from_str(&db.side)?,
            unit_price: parse_decimal("unit_price", &db.unit_price)?,
            fee: parse_decimal("fee", &db.fee)?,
            tax_rate: parse_decimal("tax_rate", &db.tax_rate)?,
            calculated_pl: parse_decimal("calculated_pl", &db.calculated_pl)?,
            id: db.id,
            owner_id: db.owner_id,
            account_id: db.account_id,
            ticker: db.ticker,
            trade_date: DateTime::from_naive_utc_and_offset(db.trade_date, Utc),
            seq: db.seq,
            quantity: db.quantity,
            note: db.note,
            created_at: DateTime::from_naive_utc_and_offset(db.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(db.updated_at, Utc),
        })
    }
}

/// Input model for recording a new trade
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub id: Option<String>,
    pub owner_id: String,
    pub account_id: String,
    pub ticker: String,
    pub side: TradeSide,
    pub trade_date: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub fee: Decimal,
    pub tax_rate: Decimal,
    pub note: Option<String>,
}

impl NewTransaction {
    /// Validates the new transaction data
    pub fn validate(&self) -> Result<()> {
        if self.owner_id.trim().is_empty() {
            return Err(TransactionError::InvalidData(
                "Owner ID cannot be empty".to_string(),
            ));
        }
        if self.account_id.trim().is_empty() {
            return Err(TransactionError::InvalidData(
                "Account ID cannot be empty".to_string(),
            ));
        }
        if self.ticker.trim().is_empty() {
            return Err(TransactionError::InvalidData(
                "Ticker cannot be empty".to_string(),
            ));
        }
        if self.quantity <= 0 {
            return Err(TransactionError::InvalidData(
                "Quantity must be a positive integer".to_string(),
            ));
        }
        if self.unit_price.is_sign_negative() {
            return Err(TransactionError::InvalidData(
                "Unit price cannot be negative".to_string(),
            ));
        }
        if self.fee.is_sign_negative() {
            return Err(TransactionError::InvalidData(
                "Fee cannot be negative".to_string(),
            ));
        }
        if self.tax_rate.is_sign_negative() {
            return Err(TransactionError::InvalidData(
                "Tax rate cannot be negative".to_string(),
            ));
        }

        self.parse_trade_date()?;

        Ok(())
    }

    /// Parses the trade date, accepting RFC3339 or YYYY-MM-DD
    pub fn parse_trade_date(&self) -> Result<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.trade_date) {
            return Ok(dt.with_timezone(&Utc));
        }
        if let Ok(date) = NaiveDate::parse_from_str(&self.trade_date, "%Y-%m-%d") {
            let naive = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
                TransactionError::InvalidData("Invalid trade date".to_string())
            })?;
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
        Err(TransactionError::InvalidData(
            "Invalid date format. Expected ISO 8601/RFC3339 or YYYY-MM-DD".to_string(),
        ))
    }
}
