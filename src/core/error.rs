use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("invalid date {0:?}: expected YYYY-MM-DD or \"now\"")]
    InvalidDate(String),

    #[error("inflation factor collapsed to {0}; cannot express balance in today's terms")]
    InflationCollapsed(f64),

    #[error("simulation cancelled after {0} days")]
    Cancelled(u64),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
