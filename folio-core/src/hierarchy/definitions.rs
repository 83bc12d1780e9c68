//! Portfolio definitions and instrument mappings.
//!
//! A portfolio definition assigns weights to hierarchy node_ids, either as
//! explicit static weights or as a rule-based placeholder. Instrument mappings
//! say which instruments implement each node.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::table::{Table, ValidationError};
use super::WaterfallError;
use crate::domain::WEIGHT_SUM_TOLERANCE;

pub const DEFINITION_COLUMNS: [&str; 4] = ["portfolio_name", "node_id", "weight", "weight_type"];
pub const MAPPING_COLUMNS: [&str; 4] = ["node_id", "instrument_id", "instrument_type", "data_source"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightType {
    Static,
    RuleBased,
}

impl WeightType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "static" => Some(WeightType::Static),
            "rule_based" => Some(WeightType::RuleBased),
            _ => None,
        }
    }
}

/// How the node weights of a portfolio were derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    Static,
    RuleBasedStub,
}

impl AllocationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AllocationMode::Static => "static",
            AllocationMode::RuleBasedStub => "rule_based_stub",
        }
    }
}

impl std::fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the portfolio definitions table.
///
/// `weight` is kept as written; only static portfolios need it numeric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioDefinition {
    pub portfolio_name: String,
    pub node_id: String,
    pub weight: String,
    pub weight_type: WeightType,
}

/// One row of the instrument mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentMapping {
    pub node_id: String,
    pub instrument_id: String,
    pub instrument_type: String,
    pub data_source: String,
}

/// Validate and read the portfolio definitions table.
///
/// Checks run in order and the first failure is returned: required columns,
/// non-empty, blank key cells, weight_type values, duplicate
/// (portfolio_name, node_id) pairs.
pub fn parse_portfolio_definitions(
    table: &Table,
) -> Result<Vec<PortfolioDefinition>, ValidationError> {
    table.require_columns(&DEFINITION_COLUMNS)?;
    table.require_rows()?;
    table.require_non_blank(&["portfolio_name", "node_id", "weight_type"])?;

    let invalid: BTreeSet<String> = table
        .column_values("weight_type")
        .into_iter()
        .filter(|v| WeightType::parse(v).is_none())
        .map(str::to_string)
        .collect();
    if !invalid.is_empty() {
        return Err(ValidationError::InvalidWeightType(
            invalid.into_iter().collect(),
        ));
    }

    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for row in 0..table.len() {
        let pair = (
            table.cell(row, "portfolio_name").to_string(),
            table.cell(row, "node_id").to_string(),
        );
        if !seen.insert(pair.clone()) {
            duplicates.insert(pair);
        }
    }
    if !duplicates.is_empty() {
        return Err(ValidationError::DuplicatePairs(
            duplicates.into_iter().collect(),
        ));
    }

    Ok((0..table.len())
        .filter_map(|row| {
            Some(PortfolioDefinition {
                portfolio_name: table.cell(row, "portfolio_name").to_string(),
                node_id: table.cell(row, "node_id").to_string(),
                weight: table.cell(row, "weight").to_string(),
                weight_type: WeightType::parse(table.cell(row, "weight_type"))?,
            })
        })
        .collect())
}

/// Validate and read the instrument mapping table. Every column is required
/// and non-blank.
pub fn parse_instrument_mappings(
    table: &Table,
) -> Result<Vec<InstrumentMapping>, ValidationError> {
    table.require_columns(&MAPPING_COLUMNS)?;
    table.require_rows()?;
    table.require_non_blank(&MAPPING_COLUMNS)?;

    Ok((0..table.len())
        .map(|row| InstrumentMapping {
            node_id: table.cell(row, "node_id").to_string(),
            instrument_id: table.cell(row, "instrument_id").to_string(),
            instrument_type: table.cell(row, "instrument_type").to_string(),
            data_source: table.cell(row, "data_source").to_string(),
        })
        .collect())
}

/// Node weights for one portfolio's rows, in row order.
///
/// Static rows must all parse as numbers summing to 1.0 within 1e-9.
/// Rule-based rows get 1/n each.
pub fn derive_node_weights(
    rows: &[PortfolioDefinition],
) -> Result<(Vec<(String, f64)>, AllocationMode), WaterfallError> {
    let types: BTreeSet<WeightType> = rows.iter().map(|r| r.weight_type).collect();
    if types.len() != 1 {
        return Err(WaterfallError::MixedWeightTypes);
    }

    match rows[0].weight_type {
        WeightType::Static => {
            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let weight = row
                    .weight
                    .parse::<f64>()
                    .ok()
                    .filter(|w| !w.is_nan())
                    .ok_or(WaterfallError::NonNumericStaticWeight)?;
                out.push((row.node_id.clone(), weight));
            }
            let total: f64 = out.iter().map(|(_, w)| w).sum();
            if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                return Err(WaterfallError::StaticWeightSum(total));
            }
            Ok((out, AllocationMode::Static))
        }
        WeightType::RuleBased => {
            let each = 1.0 / rows.len() as f64;
            let out = rows.iter().map(|r| (r.node_id.clone(), each)).collect();
            Ok((out, AllocationMode::RuleBasedStub))
        }
    }
}
