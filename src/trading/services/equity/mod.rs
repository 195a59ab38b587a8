pub mod equity_service;

pub use equity_service::EquityService;
