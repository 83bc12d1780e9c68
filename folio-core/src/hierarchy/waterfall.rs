//! Weighting waterfall — hierarchy and definitions down to instrument weights.
//!
//! - `equal_weight_leaves`: recursive equal split at every level, then across
//!   the leaves under each level4 label
//! - `instrument_targets`: the equal split over an instrument hierarchy,
//!   grouped by (ticker, instrument_type)
//! - `portfolio_targets`: definition-driven node weights, each split equally
//!   across the instruments mapped to the node

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::definitions::{
    derive_node_weights, AllocationMode, InstrumentMapping, PortfolioDefinition,
};
use super::tree::{Hierarchy, HierarchyNode, Leaf};
use super::WaterfallError;

/// Every leaf with its share of a unit weight.
///
/// A leaf's weight is the product of `1/|siblings|` at each level on its path.
/// An empty tree yields no leaves.
pub fn equal_weight_leaves(hierarchy: &Hierarchy) -> Vec<(Leaf, f64)> {
    let mut out = Vec::new();
    descend(&hierarchy.roots, 1.0, &mut out);
    out
}

fn descend(children: &BTreeMap<String, HierarchyNode>, weight: f64, out: &mut Vec<(Leaf, f64)>) {
    if children.is_empty() {
        return;
    }
    let share = weight / children.len() as f64;
    for node in children.values() {
        match node {
            HierarchyNode::Branch(grandchildren) => descend(grandchildren, share, out),
            HierarchyNode::Leaves(leaves) if !leaves.is_empty() => {
                let each = share / leaves.len() as f64;
                out.extend(leaves.iter().map(|leaf| (leaf.clone(), each)));
            }
            HierarchyNode::Leaves(_) => {}
        }
    }
}

/// One row of the equal-weight instrument target table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentTarget {
    pub ticker: String,
    pub instrument_type: String,
    pub target_weight: f64,
}

/// Equal-weight targets over an instrument hierarchy, grouped by
/// (ticker, instrument_type) with weights summed and rows sorted by key.
pub fn instrument_targets(hierarchy: &Hierarchy) -> Vec<InstrumentTarget> {
    let mut grouped: BTreeMap<(String, String), f64> = BTreeMap::new();
    for (leaf, weight) in equal_weight_leaves(hierarchy) {
        if let Leaf::Instrument {
            ticker,
            instrument_type,
        } = leaf
        {
            *grouped.entry((ticker, instrument_type)).or_insert(0.0) += weight;
        }
    }
    grouped
        .into_iter()
        .map(|((ticker, instrument_type), target_weight)| InstrumentTarget {
            ticker,
            instrument_type,
            target_weight,
        })
        .collect()
}

// ─── Definition-driven targets ───────────────────────────────────────

/// Selectable node-weighting methods.
///
/// Every method currently derives weights the same way; the selector exists
/// so system configs can name a method ahead of its implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMethod {
    #[default]
    Default,
    EqualRisk,
    RiskParity,
    HierarchicalRiskParity,
}

impl WeightingMethod {
    /// Case-insensitive. Unknown names log a warning and use `Default`.
    pub fn from_name(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "default" => WeightingMethod::Default,
            "equal_risk" => WeightingMethod::EqualRisk,
            "risk_parity" => WeightingMethod::RiskParity,
            "hierarchical_risk_parity" => WeightingMethod::HierarchicalRiskParity,
            other => {
                tracing::warn!(method = other, "unknown weighting method, using default");
                WeightingMethod::Default
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeightingMethod::Default => "default",
            WeightingMethod::EqualRisk => "equal_risk",
            WeightingMethod::RiskParity => "risk_parity",
            WeightingMethod::HierarchicalRiskParity => "hierarchical_risk_parity",
        }
    }

    pub fn node_weights(
        self,
        rows: &[PortfolioDefinition],
    ) -> Result<(Vec<(String, f64)>, AllocationMode), WaterfallError> {
        match self {
            WeightingMethod::Default
            | WeightingMethod::EqualRisk
            | WeightingMethod::RiskParity
            | WeightingMethod::HierarchicalRiskParity => derive_node_weights(rows),
        }
    }
}

/// One row of the portfolio target table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetRow {
    pub portfolio_name: String,
    pub node_id: String,
    pub instrument_id: String,
    pub instrument_type: String,
    pub allocation_mode: AllocationMode,
    pub target_weight: f64,
}

/// Instrument targets for one named portfolio.
///
/// Rows sharing (portfolio, node, instrument, type, mode) are summed; output
/// is sorted by that key.
pub fn portfolio_targets(
    portfolio_name: &str,
    hierarchy: &Hierarchy,
    definitions: &[PortfolioDefinition],
    mappings: &[InstrumentMapping],
    method: WeightingMethod,
) -> Result<Vec<TargetRow>, WaterfallError> {
    let rows: Vec<PortfolioDefinition> = definitions
        .iter()
        .filter(|d| d.portfolio_name == portfolio_name)
        .cloned()
        .collect();
    if rows.is_empty() {
        return Err(WaterfallError::PortfolioNotFound(portfolio_name.to_string()));
    }

    let known = hierarchy.node_ids();
    let unknown: BTreeSet<String> = rows
        .iter()
        .filter(|r| !known.contains(&r.node_id))
        .map(|r| r.node_id.clone())
        .collect();
    if !unknown.is_empty() {
        return Err(WaterfallError::UnknownNodeIds(unknown.into_iter().collect()));
    }

    let (node_weights, mode) = method.node_weights(&rows)?;

    let selected: BTreeSet<&str> = node_weights.iter().map(|(id, _)| id.as_str()).collect();
    if !mappings.iter().any(|m| selected.contains(m.node_id.as_str())) {
        return Err(WaterfallError::NoMappingsForNodes);
    }

    let mut grouped: BTreeMap<(String, String, String, AllocationMode), f64> = BTreeMap::new();
    for (node_id, node_weight) in &node_weights {
        let mapped: Vec<&InstrumentMapping> =
            mappings.iter().filter(|m| &m.node_id == node_id).collect();
        if mapped.is_empty() {
            return Err(WaterfallError::NoMappingForNode(node_id.clone()));
        }
        let each = node_weight / mapped.len() as f64;
        for m in mapped {
            let key = (
                m.node_id.clone(),
                m.instrument_id.clone(),
                m.instrument_type.clone(),
                mode,
            );
            *grouped.entry(key).or_insert(0.0) += each;
        }
    }

    tracing::info!(
        portfolio = portfolio_name,
        method = method.as_str(),
        mode = mode.as_str(),
        rows = grouped.len(),
        "derived portfolio targets"
    );

    Ok(grouped
        .into_iter()
        .map(
            |((node_id, instrument_id, instrument_type, allocation_mode), target_weight)| {
                TargetRow {
                    portfolio_name: portfolio_name.to_string(),
                    node_id,
                    instrument_id,
                    instrument_type,
                    allocation_mode,
                    target_weight,
                }
            },
        )
        .collect())
}
