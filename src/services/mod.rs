pub mod analytics;
pub mod meter;
pub mod tariff;

pub use meter::MeterService;
