//! Hierarchy-driven target runs.
//!
//! - `run_portfolio_targets()`: definition-driven instrument targets for one
//!   named portfolio, written to `outputs/<mode>/runtime/portfolio_targets.csv`
//! - `run_instrument_waterfall()`: equal-weight targets straight from an
//!   instrument hierarchy
//!
//! The weighting method comes from `beta_engine.weighting_method` in the
//! mode's engine config. A missing file, or a missing or malformed section,
//! selects the default method.

use std::path::{Path, PathBuf};

use folio_core::config::load_raw_config;
use folio_core::hierarchy::{
    instrument_targets, parse_instrument_mappings, parse_portfolio_definitions, portfolio_targets,
    Hierarchy, InstrumentTarget, TargetRow, WeightingMethod,
};
use serde_json::Value;

use crate::config::{SystemMode, Workspace};
use crate::export::export_targets_csv;
use crate::runner::RunError;
use crate::sink::{write_gated, PublishGate, SinkError};
use crate::tables::read_table;

pub const TARGETS_FILE: &str = "portfolio_targets.csv";

/// Weighting method configured for `mode`.
pub fn read_weighting_method(path: &Path) -> Result<WeightingMethod, RunError> {
    if !path.exists() {
        return Ok(WeightingMethod::Default);
    }
    let raw = load_raw_config(path)?;
    let method = raw
        .get("beta_engine")
        .and_then(Value::as_object)
        .and_then(|beta| beta.get("weighting_method"))
        .map(|v| match v {
            Value::String(s) => WeightingMethod::from_name(s),
            other => WeightingMethod::from_name(&other.to_string()),
        })
        .unwrap_or_default();
    Ok(method)
}

/// Targets for `portfolio_name` from the workspace's definition tables.
pub fn build_portfolio_targets(
    workspace: &Workspace,
    portfolio_name: &str,
    mode: SystemMode,
) -> Result<Vec<TargetRow>, RunError> {
    let hierarchy_table = read_table(&workspace.node_hierarchy_path(), "hierarchy CSV")?;
    let hierarchy = Hierarchy::from_node_table(&hierarchy_table)?;
    let definitions_table = read_table(&workspace.definitions_path(), "Portfolio definitions")?;
    let definitions = parse_portfolio_definitions(&definitions_table)?;
    let mapping_table = read_table(&workspace.mapping_path(), "Instrument mapping")?;
    let mappings = parse_instrument_mappings(&mapping_table)?;

    let method = read_weighting_method(&workspace.engine_config_path(mode))?;
    tracing::debug!(method = method.as_str(), "weighting method");
    Ok(portfolio_targets(
        portfolio_name,
        &hierarchy,
        &definitions,
        &mappings,
        method,
    )?)
}

/// Build targets and write them under `outputs/<mode>/runtime/`.
pub fn run_portfolio_targets(
    workspace: &Workspace,
    portfolio_name: &str,
    mode: SystemMode,
    gate: &dyn PublishGate,
) -> Result<(PathBuf, Vec<TargetRow>), RunError> {
    let rows = build_portfolio_targets(workspace, portfolio_name, mode)?;
    let path = workspace.runtime_dir(mode).join(TARGETS_FILE);
    let csv = export_targets_csv(&rows).map_err(SinkError::from)?;
    write_gated(gate, &path, &csv)?;
    tracing::info!(
        portfolio = portfolio_name,
        %mode,
        rows = rows.len(),
        path = %path.display(),
        "wrote portfolio targets"
    );
    Ok((path, rows))
}

/// Equal-weight instrument targets from an instrument hierarchy CSV.
pub fn run_instrument_waterfall(path: &Path) -> Result<Vec<InstrumentTarget>, RunError> {
    let table = read_table(path, "hierarchy CSV")?;
    let hierarchy = Hierarchy::from_instrument_table(&table)?;
    let targets = instrument_targets(&hierarchy);
    tracing::info!(
        leaves = hierarchy.leaf_count(),
        instruments = targets.len(),
        "instrument waterfall"
    );
    Ok(targets)
}
