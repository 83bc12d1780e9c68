//! Backtest runner — wires together portfolio, prices, engine and metrics.
//!
//! Entry points:
//! - `run_backtest()`: resolves every input from a `Workspace`. Used by the CLI.
//! - `run_backtest_from_data()`: takes pre-loaded inputs, no I/O.
//! - `compare()`: several portfolios against one engine config, in parallel.

use chrono::{NaiveDate, SecondsFormat, Utc};
use folio_core::config::{load_engine_config, ConfigError};
use folio_core::hierarchy::{ValidationError, WaterfallError};
use folio_core::{EngineConfig, EngineError, PortfolioEngine};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SettingsError, SimulationSettings, SystemMode, Workspace};
use crate::dataset::{build_canonical_dataset, mean_defined, CanonicalRow};
use crate::metrics::MonthlyMetrics;
use crate::portfolio::{load_portfolio, PortfolioSpec};
use crate::prices::{load_prices, PriceStats, PriceTable};
use crate::simulation::{simulate, SimulationError};
use crate::sink::SinkError;
use crate::tables::LoadError;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Waterfall(#[from] WaterfallError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
    #[error("publish error: {0}")]
    Sink(#[from] SinkError),
    #[error("compare needs at least two strategies, got {0}")]
    NotEnoughStrategies(usize),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy_id: String,
    pub strategy_name: String,
    pub slug: String,
    pub mode: SystemMode,
    pub portfolio: PortfolioSpec,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub transaction_cost_bps: f64,
    pub slippage_bps: f64,
    pub config_fingerprint: String,
    pub dataset_hash: String,
    pub price_stats: PriceStats,
    pub metrics: MonthlyMetrics,
    pub total_turnover: f64,
    pub total_costs: f64,
    pub publish_timestamp: String,
    pub dataset: Vec<CanonicalRow>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// UTC now, second precision, `+00:00` offset.
pub fn publish_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Run one portfolio for `mode`, reading every input from `workspace`.
pub fn run_backtest(
    workspace: &Workspace,
    strategy_id: &str,
    mode: SystemMode,
) -> Result<BacktestResult, RunError> {
    let config = load_engine_config(&workspace.engine_config_path(mode))?;
    let portfolio = load_portfolio(&workspace.portfolios_dir(), strategy_id, mode)?;
    let (daily, stats) = load_prices(&workspace.prices_path(), &portfolio.symbols())?;
    let monthly = daily.month_end_sample();

    run_backtest_from_data(
        &config,
        &portfolio,
        &monthly,
        &stats,
        workspace.simulation(),
        mode,
        &publish_timestamp(),
    )
}

/// Run a backtest with pre-loaded data — no I/O.
///
/// `prices` must already be sampled to one row per month. The portfolio's
/// weights replace the allocation model's `weights` param; everything else in
/// `config` is used as given.
pub fn run_backtest_from_data(
    config: &EngineConfig,
    portfolio: &PortfolioSpec,
    prices: &PriceTable,
    stats: &PriceStats,
    settings: &SimulationSettings,
    mode: SystemMode,
    publish_timestamp: &str,
) -> Result<BacktestResult, RunError> {
    settings.validate()?;
    let config = config.with_allocation_weights(&portfolio.tickers);
    let engine = PortfolioEngine::new(config)?;

    let sim = simulate(&engine, prices, settings)?;
    let dates = sim.dates();
    let equity = sim.equity();
    let metrics = MonthlyMetrics::compute(&dates, &equity, &sim.returns(), sim.total_turnover);
    let dataset =
        build_canonical_dataset(&sim, &portfolio.name, publish_timestamp, &portfolio.symbols());

    let (start_date, end_date) = match (dates.first(), dates.last()) {
        (Some(s), Some(e)) => (*s, *e),
        _ => return Err(SimulationError::EmptyPrices.into()),
    };

    tracing::info!(
        strategy = %portfolio.name,
        %mode,
        %start_date,
        %end_date,
        periods = equity.len(),
        cagr = metrics.cagr,
        sharpe = metrics.sharpe,
        max_drawdown = metrics.max_drawdown,
        turnover = sim.total_turnover,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        strategy_id: portfolio.id.clone(),
        strategy_name: portfolio.name.clone(),
        slug: portfolio.slug(),
        mode,
        portfolio: portfolio.clone(),
        start_date,
        end_date,
        initial_capital: settings.initial_capital,
        transaction_cost_bps: settings.transaction_cost_bps,
        slippage_bps: settings.slippage_bps,
        config_fingerprint: engine.config().fingerprint(),
        dataset_hash: prices.dataset_hash(),
        price_stats: stats.clone(),
        metrics,
        total_turnover: sim.total_turnover,
        total_costs: sim.total_costs,
        publish_timestamp: publish_timestamp.to_string(),
        dataset,
    })
}

// ─── Comparison ─────────────────────────────────────────────────────

/// Per-strategy line of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy_id: String,
    pub strategy_name: String,
    pub mean_rolling_5y_cagr: Option<f64>,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
}

/// How often strategy `a`'s rolling 5-year CAGR beat `b`'s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseShare {
    pub a: String,
    pub b: String,
    /// Dates on which both rolling values are defined.
    pub periods: usize,
    /// Fraction of those dates with `a > b`; `None` when `periods` is 0.
    pub share_a_beats_b: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub strategies: Vec<StrategySummary>,
    pub pairs: Vec<PairwiseShare>,
}

/// Backtest every strategy in parallel and summarise them.
///
/// Results are returned in input order alongside the comparison.
pub fn compare(
    workspace: &Workspace,
    strategy_ids: &[String],
    mode: SystemMode,
) -> Result<(Vec<BacktestResult>, Comparison), RunError> {
    if strategy_ids.len() < 2 {
        return Err(RunError::NotEnoughStrategies(strategy_ids.len()));
    }
    let results = strategy_ids
        .par_iter()
        .map(|id| run_backtest(workspace, id, mode))
        .collect::<Result<Vec<_>, _>>()?;
    let comparison = compare_results(&results);
    Ok((results, comparison))
}

/// Summaries plus every ordered pair (i < j) of `results`.
pub fn compare_results(results: &[BacktestResult]) -> Comparison {
    let strategies = results
        .iter()
        .map(|r| {
            let rolling: Vec<Option<f64>> = r.dataset.iter().map(|row| row.rolling_60m_cagr).collect();
            StrategySummary {
                strategy_id: r.strategy_id.clone(),
                strategy_name: r.strategy_name.clone(),
                mean_rolling_5y_cagr: mean_defined(&rolling),
                cagr: r.metrics.cagr,
                volatility: r.metrics.volatility,
                sharpe: r.metrics.sharpe,
                max_drawdown: r.metrics.max_drawdown,
            }
        })
        .collect();

    let mut pairs = Vec::new();
    for (i, a) in results.iter().enumerate() {
        for b in &results[i + 1..] {
            pairs.push(pairwise_share(a, b));
        }
    }
    Comparison { strategies, pairs }
}

fn pairwise_share(a: &BacktestResult, b: &BacktestResult) -> PairwiseShare {
    let b_by_date: std::collections::BTreeMap<NaiveDate, f64> = b
        .dataset
        .iter()
        .filter_map(|row| row.rolling_60m_cagr.map(|v| (row.date, v)))
        .collect();
    let (mut periods, mut wins) = (0usize, 0usize);
    for row in &a.dataset {
        if let (Some(va), Some(vb)) = (row.rolling_60m_cagr, b_by_date.get(&row.date)) {
            periods += 1;
            if va > *vb {
                wins += 1;
            }
        }
    }
    PairwiseShare {
        a: a.strategy_name.clone(),
        b: b.strategy_name.clone(),
        periods,
        share_a_beats_b: (periods > 0).then(|| wins as f64 / periods as f64),
    }
}
