//! Export — JSON and CSV artifacts.
//!
//! - **JSON**: full `BacktestResult` round-trip with schema versioning
//! - **CSV**: canonical dataset (10-decimal floats, blank for undefined
//!   rolling values), portfolio targets and instrument targets
//!
//! Unknown (newer) schema versions are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use folio_core::hierarchy::{InstrumentTarget, TargetRow};

use crate::dataset::{dataset_columns, CanonicalRow};
use crate::runner::{BacktestResult, Comparison, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
///
/// The version is read before the body, so a newer file is reported as such
/// even when its fields no longer match this build's `BacktestResult`.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let raw: serde_json::Value =
        serde_json::from_str(json).context("failed to parse BacktestResult JSON")?;
    let version = match raw.get("schema_version") {
        None => SCHEMA_VERSION,
        Some(v) => v
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .with_context(|| format!("invalid schema_version {v}"))?,
    };
    if version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            version,
            SCHEMA_VERSION
        );
    }
    serde_json::from_value(raw).context("failed to deserialize BacktestResult from JSON")
}

/// Load a result previously written by a `DirectorySink`.
pub fn load_result(path: &Path) -> Result<BacktestResult> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

pub fn export_comparison_json(comparison: &Comparison) -> Result<String> {
    serde_json::to_string_pretty(comparison).context("failed to serialize comparison to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

fn fixed(value: f64) -> String {
    format!("{value:.10}")
}

fn fixed_opt(value: Option<f64>) -> String {
    value.map(fixed).unwrap_or_default()
}

/// Export the canonical dataset.
///
/// Weight columns are the union of all rows' symbols, sorted; a row without a
/// given symbol leaves that cell blank.
pub fn export_dataset_csv(rows: &[CanonicalRow]) -> Result<String> {
    let columns = dataset_columns(rows);
    let symbols: Vec<&str> = columns
        .iter()
        .filter_map(|c| c.strip_prefix("weight_"))
        .collect();

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(&columns)?;
    for row in rows {
        let mut record = vec![
            row.date.to_string(),
            fixed(row.portfolio_value),
            fixed(row.monthly_return),
            fixed(row.cumulative_return),
            fixed_opt(row.rolling_60m_cagr),
            fixed_opt(row.rolling_60m_vol),
            fixed_opt(row.rolling_60m_sharpe),
        ];
        record.extend(
            symbols
                .iter()
                .map(|s| fixed_opt(row.weights.get(*s).copied())),
        );
        record.push(row.strategy_name.clone());
        record.push(row.publish_timestamp.clone());
        wtr.write_record(&record)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: portfolio_name, node_id, instrument_id, instrument_type,
/// allocation_mode, target_weight
pub fn export_targets_csv(rows: &[TargetRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "portfolio_name",
        "node_id",
        "instrument_id",
        "instrument_type",
        "allocation_mode",
        "target_weight",
    ])?;
    for r in rows {
        wtr.write_record([
            r.portfolio_name.as_str(),
            r.node_id.as_str(),
            r.instrument_id.as_str(),
            r.instrument_type.as_str(),
            r.allocation_mode.as_str(),
            &r.target_weight.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: ticker, instrument_type, target_weight
pub fn export_instrument_targets_csv(rows: &[InstrumentTarget]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ticker", "instrument_type", "target_weight"])?;
    for r in rows {
        wtr.write_record([
            r.ticker.as_str(),
            r.instrument_type.as_str(),
            &r.target_weight.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
