pub mod db;
pub mod errors;
pub mod schema;

pub mod ledger;
pub mod lots;
pub mod reporting;
pub mod transactions;

pub use errors::{Error, Result};
pub use ledger::*;
pub use transactions::*;
