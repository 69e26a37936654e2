use std::convert::Infallible;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::error::{ForecastError, Result};
use super::types::{RateConstants, SimulationInput, SimulationOutput, YearTraceRow};

#[derive(Debug, Clone, Copy)]
struct FundState {
    balance: f64,
    inflation_factor: f64,
    total_contributed: f64,
    days_elapsed: u64,
}

impl FundState {
    fn opening(starting_balance: f64) -> Self {
        Self {
            balance: starting_balance,
            inflation_factor: 1.0,
            total_contributed: 0.0,
            days_elapsed: 0,
        }
    }

    // Growth lands before the day's contribution, so new money earns nothing on its first day.
    fn advance_day(&mut self, rates: &RateConstants, daily_contribution: f64) {
        self.balance *= 1.0 + rates.daily_growth_rate;
        self.balance += daily_contribution;
        self.total_contributed += daily_contribution;
        self.inflation_factor *= 1.0 + rates.daily_inflation_rate;
        self.days_elapsed += 1;
    }

    fn output(self) -> SimulationOutput {
        SimulationOutput {
            ending_balance: self.balance,
            ending_inflation_factor: self.inflation_factor,
        }
    }
}

fn simulated_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// Steps through every day of the closed range, handing the post-step state to `on_day`.
fn run_days<B, F>(
    input: &SimulationInput,
    rates: &RateConstants,
    mut on_day: F,
) -> ControlFlow<B, FundState>
where
    F: FnMut(NaiveDate, &FundState) -> ControlFlow<B>,
{
    let daily_contribution = input.daily_contribution();
    let mut state = FundState::opening(input.starting_balance);

    for day in simulated_days(input.start_date, input.end_date) {
        state.advance_day(rates, daily_contribution);
        on_day(day, &state)?;
    }

    debug!(
        start = %input.start_date,
        end = %input.end_date,
        days = state.days_elapsed,
        balance = state.balance,
        inflation_factor = state.inflation_factor,
        "simulation finished"
    );
    ControlFlow::Continue(state)
}

pub fn simulate(input: &SimulationInput, rates: &RateConstants) -> SimulationOutput {
    match run_days::<Infallible, _>(input, rates, |_, _| ControlFlow::Continue(())) {
        ControlFlow::Continue(state) => state.output(),
        ControlFlow::Break(never) => match never {},
    }
}

fn check_cancel(cancel: &AtomicBool, state: &FundState) -> ControlFlow<u64> {
    if cancel.load(Ordering::Relaxed) {
        ControlFlow::Break(state.days_elapsed)
    } else {
        ControlFlow::Continue(())
    }
}

fn cancelled(days: u64) -> ForecastError {
    debug!(days, "simulation cancelled");
    ForecastError::Cancelled(days)
}

/// Same as [`simulate`], but checks `cancel` once per simulated day.
pub fn simulate_cancellable(
    input: &SimulationInput,
    rates: &RateConstants,
    cancel: &AtomicBool,
) -> Result<SimulationOutput> {
    match run_days(input, rates, |_, state| check_cancel(cancel, state)) {
        ControlFlow::Continue(state) => Ok(state.output()),
        ControlFlow::Break(days) => Err(cancelled(days)),
    }
}

/// Runs the daily loop once, collecting a row on each Dec 31 and on the final day.
fn trace_days<B, F>(
    input: &SimulationInput,
    rates: &RateConstants,
    mut keep_going: F,
) -> ControlFlow<B, (FundState, Vec<YearTraceRow>)>
where
    F: FnMut(&FundState) -> ControlFlow<B>,
{
    let mut rows = Vec::new();
    let end = input.end_date;

    let state = run_days(input, rates, |day, state| {
        let year_end = day.month() == 12 && day.day() == 31;
        if year_end || day == end {
            rows.push(YearTraceRow {
                date: day,
                days_elapsed: state.days_elapsed,
                nominal_balance: state.balance,
                inflation_factor: state.inflation_factor,
                real_balance: state.balance / state.inflation_factor,
                total_contributed: state.total_contributed,
            });
        }
        keep_going(state)
    })?;

    ControlFlow::Continue((state, rows))
}

/// Records one row on the last simulated day of each calendar year, plus the final day.
pub fn run_yearly_trace(input: &SimulationInput, rates: &RateConstants) -> Vec<YearTraceRow> {
    match trace_days::<Infallible, _>(input, rates, |_| ControlFlow::Continue(())) {
        ControlFlow::Continue((_, rows)) => rows,
        ControlFlow::Break(never) => match never {},
    }
}

/// Single cancellable pass producing both the final output and the yearly rows.
pub fn run_yearly_trace_cancellable(
    input: &SimulationInput,
    rates: &RateConstants,
    cancel: &AtomicBool,
) -> Result<(SimulationOutput, Vec<YearTraceRow>)> {
    match trace_days(input, rates, |state| check_cancel(cancel, state)) {
        ControlFlow::Continue((state, rows)) => Ok((state.output(), rows)),
        ControlFlow::Break(days) => Err(cancelled(days)),
    }
}
