//! Canonical per-period dataset published alongside every backtest.
//!
//! Columns, in order: `date, portfolio_value, monthly_return,
//! cumulative_return, rolling_60m_cagr, rolling_60m_vol, rolling_60m_sharpe,
//! weight_<SYM>... (sorted), strategy_name, publish_timestamp`.
//!
//! Rolling statistics are `None` until their window is full.

use chrono::NaiveDate;
use folio_core::domain::Weights;
use serde::{Deserialize, Serialize};

use crate::metrics::{mean, sample_std, MONTHS_PER_YEAR};
use crate::simulation::SimulationOutput;

/// Rolling window length in months.
pub const ROLLING_WINDOW: usize = 60;
const ROLLING_YEARS: f64 = ROLLING_WINDOW as f64 / MONTHS_PER_YEAR;

pub const FIXED_LEADING_COLUMNS: [&str; 7] = [
    "date",
    "portfolio_value",
    "monthly_return",
    "cumulative_return",
    "rolling_60m_cagr",
    "rolling_60m_vol",
    "rolling_60m_sharpe",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub date: NaiveDate,
    pub portfolio_value: f64,
    pub monthly_return: f64,
    pub cumulative_return: f64,
    pub rolling_60m_cagr: Option<f64>,
    pub rolling_60m_vol: Option<f64>,
    pub rolling_60m_sharpe: Option<f64>,
    /// Keyed by bare symbol; the `weight_` prefix is added on export.
    pub weights: Weights,
    pub strategy_name: String,
    pub publish_timestamp: String,
}

/// Build the canonical rows for one simulation.
pub fn build_canonical_dataset(
    sim: &SimulationOutput,
    strategy_name: &str,
    publish_timestamp: &str,
    tickers: &[String],
) -> Vec<CanonicalRow> {
    let equity = sim.equity();
    let returns = sim.returns();
    let cagr = rolling_cagr(&equity);
    let (vol, sharpe) = rolling_vol_sharpe(&returns);

    let mut growth = 1.0;
    sim.periods
        .iter()
        .enumerate()
        .map(|(i, period)| {
            growth *= 1.0 + period.monthly_return;
            let weights = tickers
                .iter()
                .filter_map(|t| period.weights.get(t).map(|w| (t.clone(), *w)))
                .collect();
            CanonicalRow {
                date: period.date,
                portfolio_value: period.portfolio_value,
                monthly_return: period.monthly_return,
                cumulative_return: growth - 1.0,
                rolling_60m_cagr: cagr[i],
                rolling_60m_vol: vol[i],
                rolling_60m_sharpe: sharpe[i],
                weights,
                strategy_name: strategy_name.to_string(),
                publish_timestamp: publish_timestamp.to_string(),
            }
        })
        .collect()
}

/// Header row for a set of canonical rows.
pub fn dataset_columns(rows: &[CanonicalRow]) -> Vec<String> {
    let mut symbols: Vec<&String> = rows.iter().flat_map(|r| r.weights.keys()).collect();
    symbols.sort();
    symbols.dedup();

    let mut columns: Vec<String> = FIXED_LEADING_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(symbols.into_iter().map(|s| format!("weight_{s}")));
    columns.push("strategy_name".into());
    columns.push("publish_timestamp".into());
    columns
}

/// `(pv[i] / pv[i − 60])^(1/5) − 1` from the 61st point on.
pub fn rolling_cagr(equity: &[f64]) -> Vec<Option<f64>> {
    (0..equity.len())
        .map(|i| {
            let start = equity[i.checked_sub(ROLLING_WINDOW)?];
            Some((equity[i] / start).powf(1.0 / ROLLING_YEARS) - 1.0)
        })
        .collect()
}

/// Annualized 60-period volatility and Sharpe, defined once 60 returns exist.
///
/// Sharpe is `None` when the window has zero volatility.
pub fn rolling_vol_sharpe(returns: &[f64]) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let mut vol = vec![None; returns.len()];
    let mut sharpe = vec![None; returns.len()];
    for end in ROLLING_WINDOW..=returns.len() {
        let window = &returns[end - ROLLING_WINDOW..end];
        let v = sample_std(window) * MONTHS_PER_YEAR.sqrt();
        vol[end - 1] = Some(v);
        if v != 0.0 {
            sharpe[end - 1] = Some(mean(window) * MONTHS_PER_YEAR / v);
        }
    }
    (vol, sharpe)
}

/// Mean of the defined values; `None` if there are none.
pub fn mean_defined(values: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    if defined.is_empty() {
        None
    } else {
        Some(mean(&defined))
    }
}
