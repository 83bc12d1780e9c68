//! Allocation pipeline — the four stage roles and the registry that builds them.
//!
//! A pipeline is one allocation model, an ordered overlay chain, one rebalancer
//! and one allocator:
//! - Allocation model: raw target weights for a date
//! - Overlay: weights → weights (risk/regime adjustment)
//! - Rebalancer: rebalance timing and trade deltas
//! - Allocator: weights + value + prices → target units
//!
//! Stages see the portfolio only through `PipelineContext`, which is read-only.

pub mod allocation;
pub mod allocator;
pub mod overlay;
pub mod rebalancer;
pub mod registry;

pub use allocation::{AllocationModel, StaticWeights};
pub use allocator::{Allocator, CapitalAllocator};
pub use overlay::{NoOpOverlay, Overlay};
pub use rebalancer::{MonthlyRebalancer, Rebalancer};
pub use registry::{
    build_pipeline, create_allocation_model, create_allocator, create_overlay,
    create_rebalancer, AllocationModelKind, AllocatorKind, FactoryError, OverlayKind, Pipeline,
    RebalancerKind,
};

use crate::config::Constraints;

/// Read-only state shared with every stage of one `run()` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineContext {
    pub constraints: Constraints,
}

/// Input-data errors raised while a pipeline runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("allocation weights must sum to a positive value, got {0}")]
    NonPositiveWeightSum(f64),
    #[error("portfolio value must be non-negative, got {0}")]
    NegativePortfolioValue(f64),
    #[error("missing price for {0}")]
    MissingPrice(String),
    #[error("invalid price for {symbol}: {price} (must be > 0)")]
    InvalidPrice { symbol: String, price: f64 },
}
