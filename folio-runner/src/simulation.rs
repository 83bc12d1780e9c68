//! Backtest simulation loop — an ordered fold of engine runs over a price table.
//!
//! Per period:
//! 1. value the book at this period's prices (cash + Σ units × price)
//! 2. run the engine with that value, the held units and the last rebalance date
//! 3. on rebalance, trade to target units, charging costs to cash; without
//!    leverage, buys shrink so cash never goes negative
//! 4. record post-trade equity
//!
//! The loop owns its state and never reorders periods.

use chrono::NaiveDate;
use folio_core::domain::{market_value, Positions, Weights};
use folio_core::{EngineError, PortfolioEngine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SimulationSettings;
use crate::prices::PriceTable;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("engine error on {date}: {source}")]
    Engine { date: NaiveDate, source: EngineError },
    #[error("price table is empty")]
    EmptyPrices,
}

/// One simulated period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodRecord {
    pub date: NaiveDate,
    /// Post-trade equity.
    pub portfolio_value: f64,
    pub monthly_return: f64,
    pub weights: Weights,
    pub rebalanced: bool,
    pub turnover: f64,
    pub costs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub periods: Vec<PeriodRecord>,
    /// Sum of per-period turnover, not annualized.
    pub total_turnover: f64,
    pub total_costs: f64,
    pub final_positions: Positions,
    pub final_cash: f64,
}

impl SimulationOutput {
    pub fn equity(&self) -> Vec<f64> {
        self.periods.iter().map(|p| p.portfolio_value).collect()
    }

    pub fn returns(&self) -> Vec<f64> {
        self.periods.iter().map(|p| p.monthly_return).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.periods.iter().map(|p| p.date).collect()
    }
}

/// Rounding residue below this is absorbed so an unlevered book ends flat.
const CASH_TOLERANCE: f64 = 1e-9;

/// Fraction of each buy an unlevered book can fund from cash and sale
/// proceeds once costs on both legs are paid.
fn funding_scale(cash: f64, buys: f64, sells: f64, cost_rate: f64) -> f64 {
    if buys <= 0.0 {
        return 1.0;
    }
    let available = cash + sells * (1.0 - cost_rate);
    (available / (buys * (1.0 + cost_rate))).clamp(0.0, 1.0)
}

/// Simulation state, owned by one loop invocation.
struct SimulationState {
    cash: f64,
    positions: Positions,
    last_rebalance: Option<NaiveDate>,
}

/// Run `engine` over every row of `prices`.
pub fn simulate(
    engine: &PortfolioEngine,
    prices: &PriceTable,
    settings: &SimulationSettings,
) -> Result<SimulationOutput, SimulationError> {
    if prices.is_empty() {
        return Err(SimulationError::EmptyPrices);
    }
    let cost_rate = settings.cost_rate();
    let leverage = engine.config().constraints.leverage;
    let mut state = SimulationState {
        cash: settings.initial_capital,
        positions: prices.symbols().iter().map(|s| (s.clone(), 0.0)).collect(),
        last_rebalance: None,
    };

    let mut periods: Vec<PeriodRecord> = Vec::with_capacity(prices.len());
    let mut total_turnover = 0.0;
    let mut total_costs = 0.0;

    for (i, &date) in prices.dates().iter().enumerate() {
        let px = prices.prices_at(i);
        let value = state.cash + market_value(&state.positions, &px);

        let out = engine
            .run(date, &px, value, &state.positions, state.last_rebalance)
            .map_err(|source| SimulationError::Engine { date, source })?;

        let mut turnover = 0.0;
        let mut costs = 0.0;
        if out.should_rebalance {
            let notionals: Vec<(&String, f64, f64)> = out
                .trades
                .iter()
                .map(|(symbol, du)| (symbol, *du, du * px.get(symbol).copied().unwrap_or(0.0)))
                .collect();
            let buy_scale = if leverage {
                1.0
            } else {
                let buys: f64 = notionals.iter().map(|(_, _, n)| n.max(0.0)).sum();
                let sells: f64 = notionals.iter().map(|(_, _, n)| (-n).max(0.0)).sum();
                funding_scale(state.cash, buys, sells, cost_rate)
            };

            let mut traded = 0.0;
            for (symbol, du, notional) in notionals {
                let scale = if notional > 0.0 { buy_scale } else { 1.0 };
                traded += (notional * scale).abs();
                state.cash -= notional * scale;
                *state.positions.entry(symbol.clone()).or_insert(0.0) += du * scale;
            }
            costs = traded * cost_rate;
            state.cash -= costs;
            if !leverage && state.cash < 0.0 && state.cash > -CASH_TOLERANCE {
                state.cash = 0.0;
            }
            turnover = if value > 0.0 { traded / value } else { 0.0 };
            state.last_rebalance = Some(date);
        }

        let equity = state.cash + market_value(&state.positions, &px);
        let monthly_return = match periods.last() {
            Some(prev) if prev.portfolio_value != 0.0 => equity / prev.portfolio_value - 1.0,
            _ => 0.0,
        };
        total_turnover += turnover;
        total_costs += costs;

        tracing::debug!(%date, equity, turnover, rebalanced = out.should_rebalance, "period");
        periods.push(PeriodRecord {
            date,
            portfolio_value: equity,
            monthly_return,
            weights: out.weights,
            rebalanced: out.should_rebalance,
            turnover,
            costs,
        });
    }

    Ok(SimulationOutput {
        periods,
        total_turnover,
        total_costs,
        final_positions: state.positions,
        final_cash: state.cash,
    })
}
