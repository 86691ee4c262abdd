pub mod analytics;
pub mod meter;

pub use analytics::*;
pub use meter::*;
