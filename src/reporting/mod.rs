pub mod reporting_model;
pub mod reporting_service;
pub mod reporting_traits;

pub use reporting_model::{CostBasisReport, OpenLotSummary};
pub use reporting_service::ReportingService;
pub use reporting_traits::ReportingServiceTrait;
