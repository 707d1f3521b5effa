pub mod transactions_errors;
pub mod transactions_model;
pub mod transactions_repository;

pub use transactions_errors::TransactionError;
pub use transactions_model::{NewTransaction, TradeSide, Transaction, TransactionDB};
pub use transactions_repository::TransactionRepository;
