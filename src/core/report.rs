use super::error::{ForecastError, Result};
use super::types::SimulationOutput;

/// Converts the nominal ending balance into today's money.
pub fn real_terms_balance(output: &SimulationOutput) -> Result<f64> {
    let factor = output.ending_inflation_factor;
    if factor == 0.0 || factor.is_nan() {
        return Err(ForecastError::InflationCollapsed(factor));
    }
    Ok(output.ending_balance / factor)
}

/// Two decimal places with comma-grouped thousands, e.g. `-1,234,567.89`.
pub fn format_thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{cents}")
}

pub fn summary_line(real_balance: f64) -> String {
    format!(
        "Your balance in todays terms, would be approximately: ${}",
        format_thousands(real_balance)
    )
}
