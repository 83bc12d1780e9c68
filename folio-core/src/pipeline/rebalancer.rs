//! Rebalancers — when to trade, and how many units.

use chrono::{Datelike, NaiveDate};

use super::PipelineContext;
use crate::domain::{Positions, Trades};

/// Decides rebalance timing and computes trade deltas.
pub trait Rebalancer: Send + Sync {
    /// Registry type name (e.g., "monthly").
    fn name(&self) -> &str;

    fn should_rebalance(
        &self,
        as_of: NaiveDate,
        last_rebalance: Option<NaiveDate>,
        ctx: &PipelineContext,
    ) -> bool;

    /// Signed unit deltas taking `current` to `target`.
    ///
    /// Covers the union of both symbol sets; a symbol missing on one side
    /// counts as zero units there.
    fn generate_trades(
        &self,
        current: &Positions,
        target: &Positions,
        _ctx: &PipelineContext,
    ) -> Trades {
        let mut trades = Trades::new();
        for symbol in current.keys().chain(target.keys()) {
            if trades.contains_key(symbol) {
                continue;
            }
            let have = current.get(symbol).copied().unwrap_or(0.0);
            let want = target.get(symbol).copied().unwrap_or(0.0);
            trades.insert(symbol.clone(), want - have);
        }
        trades
    }
}

/// Rebalances on the first observation of each calendar month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthlyRebalancer;

impl Rebalancer for MonthlyRebalancer {
    fn name(&self) -> &str {
        "monthly"
    }

    fn should_rebalance(
        &self,
        as_of: NaiveDate,
        last_rebalance: Option<NaiveDate>,
        _ctx: &PipelineContext,
    ) -> bool {
        match last_rebalance {
            None => true,
            Some(last) => (as_of.year(), as_of.month()) != (last.year(), last.month()),
        }
    }
}
