use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{Local, NaiveDate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::core::{
    ForecastError, RateConstants, SimulationInput, YearTraceRow, format_thousands,
    real_terms_balance, run_yearly_trace, run_yearly_trace_cancellable, simulate,
    simulate_cancellable, summary_line,
};

/// Wall-clock budget for one HTTP simulation before it is cancelled.
const SIMULATION_TIME_BUDGET: Duration = Duration::from_secs(5);

/// Long flags that may also be spelled with a single dash (`-start 2020-01-01`).
const SINGLE_DASH_FLAGS: [&str; 7] = [
    "start",
    "end",
    "balance",
    "monthly",
    "daily-growth-rate",
    "daily-inflation-rate",
    "yearly",
];

#[derive(Parser, Debug, Clone)]
#[command(
    name = "savings-forecast",
    about = "A tool for performing long-term analysis of a growing S&P500 ETF savings fund."
)]
struct Cli {
    #[arg(
        long,
        value_parser = parse_date_arg,
        help = "The date from which to start the simulation (inclusive, iso format or \"now\"); defaults to today"
    )]
    start: Option<NaiveDate>,
    #[arg(
        long,
        value_parser = parse_date_arg,
        help = "The date at which to end the simulation (inclusive, iso format or \"now\")"
    )]
    end: NaiveDate,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "The starting balance of your savings fund"
    )]
    balance: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        help = "The amount you're able to dedicate to your savings fund on a monthly basis"
    )]
    monthly: f64,
    #[arg(
        long,
        default_value_t = RateConstants::HISTORICAL_AVERAGE.daily_growth_rate,
        allow_negative_numbers = true,
        help = "Average daily index fund growth as a fraction, e.g. 0.0003"
    )]
    daily_growth_rate: f64,
    #[arg(
        long,
        default_value_t = RateConstants::HISTORICAL_AVERAGE.daily_inflation_rate,
        allow_negative_numbers = true,
        help = "Average daily inflation as a fraction, e.g. 0.00009"
    )]
    daily_inflation_rate: f64,
    #[arg(long, help = "Also print a year-by-year breakdown")]
    yearly: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct ForecastRequest {
    input: SimulationInput,
    rates: RateConstants,
    include_yearly: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    start_date: Option<String>,
    end_date: Option<String>,
    starting_balance: Option<f64>,
    monthly_contribution: Option<f64>,
    daily_growth_rate: Option<f64>,
    daily_inflation_rate: Option<f64>,
    include_yearly: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    start_date: NaiveDate,
    end_date: NaiveDate,
    days_simulated: u64,
    daily_growth_rate: f64,
    daily_inflation_rate: f64,
    ending_balance: f64,
    ending_inflation_factor: f64,
    real_balance: f64,
    formatted_real_balance: String,
    yearly: Vec<YearTraceRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn is_iso_date_shape(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// Accepts `now` or a zero-padded `YYYY-MM-DD`; surrounding whitespace is an error.
fn resolve_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, ForecastError> {
    if raw == "now" {
        return Ok(today);
    }
    if !is_iso_date_shape(raw) {
        return Err(ForecastError::InvalidDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ForecastError::InvalidDate(raw.to_string()))
}

fn parse_date_arg(raw: &str) -> Result<NaiveDate, ForecastError> {
    resolve_date(raw, today())
}

/// Rewrites `-start` style flags to clap's `--start`; values such as `-5` are left alone.
fn normalize_single_dash_flags<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .enumerate()
        .map(|(index, arg)| {
            if index == 0 || arg.starts_with("--") {
                return arg;
            }
            let Some(rest) = arg.strip_prefix('-') else {
                return arg;
            };
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if SINGLE_DASH_FLAGS.contains(&name) {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}

fn build_inputs(cli: Cli, today: NaiveDate) -> Result<ForecastRequest, String> {
    if !cli.balance.is_finite() {
        return Err("--balance must be a finite number".to_string());
    }

    if !cli.monthly.is_finite() {
        return Err("--monthly must be a finite number".to_string());
    }

    if !cli.daily_growth_rate.is_finite() {
        return Err("--daily-growth-rate must be a finite number".to_string());
    }

    if !cli.daily_inflation_rate.is_finite() {
        return Err("--daily-inflation-rate must be a finite number".to_string());
    }

    Ok(ForecastRequest {
        input: SimulationInput {
            start_date: cli.start.unwrap_or(today),
            end_date: cli.end,
            starting_balance: cli.balance,
            monthly_contribution: cli.monthly,
        },
        rates: RateConstants::new(cli.daily_growth_rate, cli.daily_inflation_rate),
        include_yearly: cli.yearly,
    })
}

fn report_lines(request: &ForecastRequest) -> Result<Vec<String>, ForecastError> {
    let output = simulate(&request.input, &request.rates);
    let real_balance = real_terms_balance(&output)?;

    let mut lines = vec![summary_line(real_balance)];
    if request.include_yearly {
        for row in run_yearly_trace(&request.input, &request.rates) {
            lines.push(format!(
                "{}  day {:>6}  nominal ${:>18}  real ${:>18}  inflation x{:.4}",
                row.date,
                row.days_elapsed,
                format_thousands(row.nominal_balance),
                format_thousands(row.real_balance),
                row.inflation_factor,
            ));
        }
    }
    Ok(lines)
}

/// Parses command-line arguments, runs the forecast and prints the result.
pub fn run_cli<I>(args: I) -> ExitCode
where
    I: IntoIterator<Item = String>,
{
    let mut out = io::stdout().lock();
    let mut err = io::stderr().lock();
    ExitCode::from(run_cli_to(args, today(), &mut out, &mut err))
}

/// Exit status: 0 on success, 2 on argument errors, 1 when the forecast itself fails.
fn run_cli_to<I, W, E>(args: I, today: NaiveDate, out: &mut W, err: &mut E) -> u8
where
    I: IntoIterator<Item = String>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(normalize_single_dash_flags(args)) {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version come through here with a zero exit code.
            let code = e.exit_code();
            let written = if code == 0 {
                write!(out, "{}", e.render())
            } else {
                write!(err, "{}", e.render())
            };
            return if written.is_ok() {
                u8::try_from(code).unwrap_or(2)
            } else {
                1
            };
        }
    };
    let request = match build_inputs(cli, today) {
        Ok(request) => request,
        Err(msg) => {
            let _ = writeln!(err, "error: {msg}");
            return 2;
        }
    };
    info!(
        start = %request.input.start_date,
        end = %request.input.end_date,
        days = request.input.day_count(),
        "running forecast"
    );

    match report_lines(&request) {
        Ok(lines) => {
            for line in lines {
                if writeln!(out, "{line}").is_err() {
                    return 1;
                }
            }
            0
        }
        Err(e) => {
            error!(error = %e, "forecast failed");
            let _ = writeln!(err, "error: {e}");
            1
        }
    }
}

pub fn router() -> Router {
    Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("savings forecast HTTP API listening on http://{addr}");

    axum::serve(listener, router()).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload, today()) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let task = tokio::task::spawn_blocking(move || run_request(&request, &worker_cancel));

    match tokio::time::timeout(SIMULATION_TIME_BUDGET, task).await {
        Ok(Ok(Ok(response))) => json_response(StatusCode::OK, response),
        Ok(Ok(Err(e))) => error_response(status_for(&e), &e.to_string()),
        Ok(Err(e)) => {
            error!(error = %e, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation task failed")
        }
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            warn!(budget = ?SIMULATION_TIME_BUDGET, "simulation exceeded time budget");
            error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "Simulation exceeded the server time budget",
            )
        }
    }
}

fn run_request(
    request: &ForecastRequest,
    cancel: &AtomicBool,
) -> Result<SimulateResponse, ForecastError> {
    let (output, yearly) = if request.include_yearly {
        run_yearly_trace_cancellable(&request.input, &request.rates, cancel)?
    } else {
        (
            simulate_cancellable(&request.input, &request.rates, cancel)?,
            Vec::new(),
        )
    };
    let real_balance = real_terms_balance(&output)?;

    Ok(SimulateResponse {
        start_date: request.input.start_date,
        end_date: request.input.end_date,
        days_simulated: request.input.day_count(),
        daily_growth_rate: request.rates.daily_growth_rate,
        daily_inflation_rate: request.rates.daily_inflation_rate,
        ending_balance: output.ending_balance,
        ending_inflation_factor: output.ending_inflation_factor,
        real_balance,
        formatted_real_balance: format_thousands(real_balance),
        yearly,
    })
}

fn status_for(error: &ForecastError) -> StatusCode {
    match error {
        ForecastError::InvalidDate(_) => StatusCode::BAD_REQUEST,
        ForecastError::InflationCollapsed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ForecastError::Cancelled(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str, today: NaiveDate) -> Result<ForecastRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload, today)
}

fn api_request_from_payload(
    payload: SimulatePayload,
    today: NaiveDate,
) -> Result<ForecastRequest, String> {
    let Some(end_date) = payload.end_date else {
        return Err("endDate is required".to_string());
    };

    let mut cli = default_cli_for_api(today);
    cli.end = resolve_date(&end_date, today).map_err(|e| format!("endDate: {e}"))?;

    if let Some(v) = payload.start_date {
        cli.start = Some(resolve_date(&v, today).map_err(|e| format!("startDate: {e}"))?);
    }
    if let Some(v) = payload.starting_balance {
        cli.balance = v;
    }
    if let Some(v) = payload.monthly_contribution {
        cli.monthly = v;
    }
    if let Some(v) = payload.daily_growth_rate {
        cli.daily_growth_rate = v;
    }
    if let Some(v) = payload.daily_inflation_rate {
        cli.daily_inflation_rate = v;
    }
    if let Some(v) = payload.include_yearly {
        cli.yearly = v;
    }

    build_inputs(cli, today)
}

fn default_cli_for_api(today: NaiveDate) -> Cli {
    Cli {
        start: None,
        end: today,
        balance: 0.0,
        monthly: 0.0,
        daily_growth_rate: RateConstants::HISTORICAL_AVERAGE.daily_growth_rate,
        daily_inflation_rate: RateConstants::HISTORICAL_AVERAGE.daily_inflation_rate,
        yearly: false,
    }
}
