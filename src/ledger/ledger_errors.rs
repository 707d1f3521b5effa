use thiserror::Error;

use crate::lots::LotError;
use crate::transactions::TransactionError;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised while replaying a group's transaction history
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Lot error: {0}")]
    Lot(#[from] LotError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}
