//! Allocators — size target weights into notional and units.

use super::{PipelineContext, PipelineError};
use crate::domain::{Allocation, Allocations, Prices, Weights};

/// Converts weights, portfolio value and prices into per-symbol sizing.
pub trait Allocator: Send + Sync {
    /// Registry type name (e.g., "capital_allocator").
    fn name(&self) -> &str;

    fn allocate(
        &self,
        weights: &Weights,
        portfolio_value: f64,
        prices: &Prices,
        ctx: &PipelineContext,
    ) -> Result<Allocations, PipelineError>;
}

/// Fully invests `portfolio_value` by weight. No rounding to whole units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapitalAllocator;

impl Allocator for CapitalAllocator {
    fn name(&self) -> &str {
        "capital_allocator"
    }

    fn allocate(
        &self,
        weights: &Weights,
        portfolio_value: f64,
        prices: &Prices,
        _ctx: &PipelineContext,
    ) -> Result<Allocations, PipelineError> {
        if portfolio_value < 0.0 {
            return Err(PipelineError::NegativePortfolioValue(portfolio_value));
        }

        let mut allocations = Allocations::new();
        for (symbol, &weight) in weights {
            let price = *prices
                .get(symbol)
                .ok_or_else(|| PipelineError::MissingPrice(symbol.clone()))?;
            if price.is_nan() || price <= 0.0 {
                return Err(PipelineError::InvalidPrice {
                    symbol: symbol.clone(),
                    price,
                });
            }
            let target_notional = portfolio_value * weight;
            allocations.insert(
                symbol.clone(),
                Allocation {
                    weight,
                    target_notional,
                    target_units: target_notional / price,
                },
            );
        }
        Ok(allocations)
    }
}
