//! Domain types shared by every pipeline stage.
//!
//! All symbol-keyed maps are `BTreeMap` so iteration and serialization order is
//! deterministic: trades come out in sorted symbol order and two runs over the
//! same inputs serialize to identical bytes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Instrument symbol → weight.
pub type Weights = BTreeMap<String, f64>;

/// Instrument symbol → held units (fractional allowed).
pub type Positions = BTreeMap<String, f64>;

/// Instrument symbol → price for the current period.
pub type Prices = BTreeMap<String, f64>;

/// Instrument symbol → signed unit delta (target − current).
pub type Trades = BTreeMap<String, f64>;

/// Instrument symbol → sizing derived from weight, portfolio value and price.
pub type Allocations = BTreeMap<String, Allocation>;

/// Sizing of a single instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub weight: f64,
    pub target_notional: f64,
    pub target_units: f64,
}

/// Absolute tolerance used when checking that weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Sum of all weights in a map.
pub fn weight_sum(weights: &Weights) -> f64 {
    weights.values().sum()
}

/// Target units per symbol, taken from a set of allocations.
pub fn target_positions(allocations: &Allocations) -> Positions {
    allocations
        .iter()
        .map(|(symbol, alloc)| (symbol.clone(), alloc.target_units))
        .collect()
}

/// Mark-to-market value of a set of positions.
///
/// Symbols without a price contribute nothing; callers that must treat a
/// missing price as fatal check before calling.
pub fn market_value(positions: &Positions, prices: &Prices) -> f64 {
    positions
        .iter()
        .map(|(symbol, units)| units * prices.get(symbol).copied().unwrap_or(0.0))
        .sum()
}
