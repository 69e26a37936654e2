use chrono::NaiveDate;
use serde::Serialize;

/// Average number of days in a Gregorian month (365.2425 / 12).
pub const AVERAGE_DAYS_PER_MONTH: f64 = 30.436875;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationInput {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub starting_balance: f64,
    pub monthly_contribution: f64,
}

impl SimulationInput {
    pub fn daily_contribution(&self) -> f64 {
        self.monthly_contribution / AVERAGE_DAYS_PER_MONTH
    }

    /// Number of days the simulation will step through; zero when the range is inverted.
    pub fn day_count(&self) -> u64 {
        if self.start_date > self.end_date {
            return 0;
        }
        (self.end_date - self.start_date).num_days() as u64 + 1
    }
}

/// Constant daily rates applied on every simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateConstants {
    pub daily_growth_rate: f64,
    pub daily_inflation_rate: f64,
}

impl RateConstants {
    /// Long-run S&P 500 total return of roughly 10% a year and US CPI inflation of
    /// roughly 3.25% a year, each converted to a compounding daily rate.
    pub const HISTORICAL_AVERAGE: RateConstants = RateConstants {
        daily_growth_rate: 0.000261,
        daily_inflation_rate: 0.0000876,
    };

    pub fn new(daily_growth_rate: f64, daily_inflation_rate: f64) -> Self {
        Self {
            daily_growth_rate,
            daily_inflation_rate,
        }
    }
}

impl Default for RateConstants {
    fn default() -> Self {
        Self::HISTORICAL_AVERAGE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutput {
    pub ending_balance: f64,
    pub ending_inflation_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearTraceRow {
    pub date: NaiveDate,
    pub days_elapsed: u64,
    pub nominal_balance: f64,
    pub inflation_factor: f64,
    pub real_balance: f64,
    pub total_contributed: f64,
}
