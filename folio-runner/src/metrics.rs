//! Monthly performance metrics — pure functions over an equity series.
//!
//! The equity series has one point per month. The first point is the
//! starting value; its return is defined as 0 and excluded from every
//! return statistic.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Aggregate statistics for one monthly backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub best_month: f64,
    pub worst_month: f64,
    pub pct_positive_months: f64,
    pub annualized_turnover: f64,
    /// Calendar year → compounded return of that year's months.
    pub annual_returns: BTreeMap<i32, f64>,
}

impl MonthlyMetrics {
    pub fn compute(dates: &[NaiveDate], equity: &[f64], returns: &[f64], total_turnover: f64) -> Self {
        let periodic = returns.get(1..).unwrap_or(&[]);
        let (best_month, worst_month) = best_and_worst(periodic);
        Self {
            total_return: total_return(equity),
            cagr: cagr(equity),
            volatility: annualized_volatility(periodic),
            sharpe: sharpe_ratio(periodic),
            max_drawdown: max_drawdown(equity),
            best_month,
            worst_month,
            pct_positive_months: pct_positive(periodic),
            annualized_turnover: annualized_turnover(total_turnover, equity.len()),
            annual_returns: annual_returns(dates, returns),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// last / first − 1; 0 for fewer than two points or a non-positive start.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if equity.len() >= 2 && first > 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

/// CAGR with `years = (n − 1) / 12`.
pub fn cagr(equity: &[f64]) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let years = (equity.len() - 1) as f64 / MONTHS_PER_YEAR;
    let growth = 1.0 + total_return(equity);
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(1.0 / years) - 1.0
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1 denominator); 0 below two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

pub fn annualized_volatility(returns: &[f64]) -> f64 {
    sample_std(returns) * MONTHS_PER_YEAR.sqrt()
}

/// Annualized mean over annualized volatility, risk-free rate 0.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let vol = annualized_volatility(returns);
    if vol == 0.0 {
        return 0.0;
    }
    mean(returns) * MONTHS_PER_YEAR / vol
}

/// Most negative peak-to-trough decline, as a non-positive fraction.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &value in equity {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.min(value / peak - 1.0);
        }
    }
    worst
}

/// First maximum and first minimum.
fn best_and_worst(returns: &[f64]) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }
    let best = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let worst = returns.iter().copied().fold(f64::INFINITY, f64::min);
    (best, worst)
}

pub fn pct_positive(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
}

/// `total_turnover / (n − 1) × 12`.
pub fn annualized_turnover(total_turnover: f64, periods: usize) -> f64 {
    if periods < 2 {
        return 0.0;
    }
    total_turnover / (periods - 1) as f64 * MONTHS_PER_YEAR
}

/// Compounded return per calendar year, skipping the first period.
pub fn annual_returns(dates: &[NaiveDate], returns: &[f64]) -> BTreeMap<i32, f64> {
    let mut growth: BTreeMap<i32, f64> = BTreeMap::new();
    for (date, r) in dates.iter().zip(returns).skip(1) {
        *growth.entry(date.year()).or_insert(1.0) *= 1.0 + r;
    }
    growth.into_iter().map(|(year, g)| (year, g - 1.0)).collect()
}
