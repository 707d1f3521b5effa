use diesel::result::Error as DieselError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LotError>;

/// Custom error type for purchase-lot operations
#[derive(Debug, Error)]
pub enum LotError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error(
        "Invariant violation on lot {lot_id}: cannot consume {requested} of {remaining} remaining"
    )]
    InvariantViolation {
        lot_id: String,
        requested: i64,
        remaining: i64,
    },
}

impl From<DieselError> for LotError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => LotError::NotFound("Record not found".to_string()),
            _ => LotError::DatabaseError(err.to_string()),
        }
    }
}
