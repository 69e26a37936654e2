mod engine;
mod error;
mod report;
mod types;

pub use engine::{
    run_yearly_trace, run_yearly_trace_cancellable, simulate, simulate_cancellable,
};
pub use error::{ForecastError, Result};
pub use report::{format_thousands, real_terms_balance, summary_line};
pub use types::{
    AVERAGE_DAYS_PER_MONTH, RateConstants, SimulationInput, SimulationOutput, YearTraceRow,
};
