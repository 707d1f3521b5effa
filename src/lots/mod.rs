pub mod lots_errors;
pub mod lots_model;
pub mod lots_repository;

pub use lots_errors::{LotError, Result};
pub use lots_model::{PurchaseLot, PurchaseLotDB, ROUNDING_SCALE};
pub use lots_repository::LotRepository;
