mod decimal;
pub mod provider;

pub use decimal::DecimalU256;
