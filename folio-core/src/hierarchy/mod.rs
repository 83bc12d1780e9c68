//! Hierarchical allocation — asset-class taxonomy to instrument target weights.
//!
//! - `table`: in-memory input tables and shared validation
//! - `tree`: the four-level hierarchy built from a table
//! - `definitions`: portfolio definitions, instrument mappings, node weights
//! - `waterfall`: equal-weight descent and definition-driven targets

pub mod definitions;
pub mod table;
pub mod tree;
pub mod waterfall;

pub use definitions::{
    derive_node_weights, parse_instrument_mappings, parse_portfolio_definitions, AllocationMode,
    InstrumentMapping, PortfolioDefinition, WeightType,
};
pub use table::{Table, ValidationError};
pub use tree::{Hierarchy, HierarchyNode, Leaf};
pub use waterfall::{
    equal_weight_leaves, instrument_targets, portfolio_targets, InstrumentTarget,
    TargetRow, WeightingMethod,
};

/// Errors raised while deriving target weights.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WaterfallError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Portfolio contains mixed weight_type values; expected one mode per portfolio")]
    MixedWeightTypes,
    #[error("Static portfolio requires numeric weight for every row")]
    NonNumericStaticWeight,
    #[error("Static portfolio weights must sum to 1.0 (got {0})")]
    StaticWeightSum(f64),
    #[error("Portfolio definition not found: {0}")]
    PortfolioNotFound(String),
    #[error("Portfolio references unknown node_id values: {0:?}")]
    UnknownNodeIds(Vec<String>),
    #[error("No instrument mappings found for selected node_ids")]
    NoMappingsForNodes,
    #[error("No instrument mapping found for node_id: {0}")]
    NoMappingForNode(String),
}
