//! Portfolio templates.
//!
//! A portfolio is assembled from three CSVs under the portfolios directory:
//! - `portfolio_templates.csv`: `mode, portfolio_id, name, rebalance`
//! - `portfolio_weights.csv`: `mode, portfolio_id, ticker, weight`
//! - `portfolio_metadata.csv` (optional): `mode, portfolio_id, key, value`
//!
//! Portfolio ids match with `-` and `_` treated as the same character.

use std::collections::BTreeMap;
use std::path::Path;

use folio_core::domain::{weight_sum, Weights, WEIGHT_SUM_TOLERANCE};
use folio_core::hierarchy::Table;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SystemMode;
use crate::tables::{read_table, LoadError};

pub const TEMPLATES_FILE: &str = "portfolio_templates.csv";
pub const WEIGHTS_FILE: &str = "portfolio_weights.csv";
pub const METADATA_FILE: &str = "portfolio_metadata.csv";

/// A model portfolio: static target weights plus descriptive metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSpec {
    pub id: String,
    pub name: String,
    pub tickers: Weights,
    pub rebalance: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl PortfolioSpec {
    /// File-name form of the portfolio name: `Core_60_40` becomes `core-60-40`.
    pub fn slug(&self) -> String {
        self.name.replace('_', "-").to_lowercase()
    }

    /// Sorted list of the portfolio's symbols.
    pub fn symbols(&self) -> Vec<String> {
        self.tickers.keys().cloned().collect()
    }
}

fn canonical_id(id: &str) -> String {
    id.trim().replace('-', "_")
}

fn rows_for<'a>(
    table: &'a Table,
    mode: SystemMode,
    id: &'a str,
) -> impl Iterator<Item = usize> + 'a {
    (0..table.len()).filter(move |&row| {
        table.cell(row, "mode") == mode.as_str() && canonical_id(table.cell(row, "portfolio_id")) == id
    })
}

/// Load portfolio `portfolio_id` for `mode` from `dir`.
pub fn load_portfolio(dir: &Path, portfolio_id: &str, mode: SystemMode) -> Result<PortfolioSpec, LoadError> {
    let templates = read_table(&dir.join(TEMPLATES_FILE), "Portfolio templates CSV")?;
    templates.require_columns(&["mode", "portfolio_id", "name", "rebalance"])?;
    let weights = read_table(&dir.join(WEIGHTS_FILE), "Portfolio weights CSV")?;
    weights.require_columns(&["mode", "portfolio_id", "ticker", "weight"])?;

    let id = canonical_id(portfolio_id);
    let template = rows_for(&templates, mode, &id).next().ok_or_else(|| {
        LoadError::Portfolio(format!(
            "Portfolio template not found for portfolio_id '{portfolio_id}' in mode '{mode}'"
        ))
    })?;

    let mut tickers = Weights::new();
    for row in rows_for(&weights, mode, &id) {
        let ticker = weights.cell(row, "ticker").to_string();
        let raw = weights.cell(row, "weight");
        let weight: f64 = raw.parse().map_err(|_| {
            LoadError::Portfolio(format!("Invalid weight '{raw}' for {ticker} in '{portfolio_id}'"))
        })?;
        tickers.insert(ticker, weight);
    }
    if tickers.is_empty() {
        return Err(LoadError::Portfolio(format!(
            "No weights found for portfolio_id '{portfolio_id}' in mode '{mode}'"
        )));
    }
    let total = weight_sum(&tickers);
    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(LoadError::Portfolio(format!(
            "Portfolio weights must sum to 1.0 (got {total})"
        )));
    }

    let mut metadata = BTreeMap::new();
    let metadata_path = dir.join(METADATA_FILE);
    if metadata_path.exists() {
        let meta = read_table(&metadata_path, "Portfolio metadata CSV")?;
        meta.require_columns(&["mode", "portfolio_id", "key", "value"])?;
        for row in rows_for(&meta, mode, &id) {
            let key = meta.cell(row, "key").to_string();
            let value = metadata_value(&key, meta.cell(row, "value"));
            metadata.insert(key, value);
        }
    }

    let spec = PortfolioSpec {
        id: templates.cell(template, "portfolio_id").to_string(),
        name: templates.cell(template, "name").to_string(),
        tickers,
        rebalance: templates.cell(template, "rebalance").to_string(),
        metadata,
    };
    tracing::debug!(id = %spec.id, symbols = spec.tickers.len(), "loaded portfolio");
    Ok(spec)
}

/// `lookback_years` is truncated to an integer when numeric; everything else
/// stays a string.
fn metadata_value(key: &str, raw: &str) -> Value {
    if key == "lookback_years" {
        if let Ok(years) = raw.parse::<f64>() {
            if years.is_finite() {
                return Value::from(years.trunc() as i64);
            }
        }
    }
    Value::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &Path, weights: &str) {
        std::fs::write(
            dir.join(TEMPLATES_FILE),
            "mode,portfolio_id,name,rebalance\ncapital,core-60-40,Core_60_40,monthly\nresearch,core-60-40,Research_60_40,monthly\n",
        )
        .unwrap();
        std::fs::write(dir.join(WEIGHTS_FILE), weights).unwrap();
    }

    const WEIGHTS: &str = "mode,portfolio_id,ticker,weight\ncapital,core-60-40,SPY,0.6\ncapital,core-60-40,TLT,0.4\nresearch,core-60-40,QQQ,1.0\n";

    #[test]
    fn loads_by_canonical_id_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), WEIGHTS);
        let spec = load_portfolio(dir.path(), "core_60_40", SystemMode::Capital).unwrap();
        assert_eq!(spec.name, "Core_60_40");
        assert_eq!(spec.slug(), "core-60-40");
        assert_eq!(spec.symbols(), vec!["SPY".to_string(), "TLT".to_string()]);

        let research = load_portfolio(dir.path(), "core-60-40", SystemMode::Research).unwrap();
        assert_eq!(research.tickers["QQQ"], 1.0);
    }

    #[test]
    fn unknown_id_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), WEIGHTS);
        let err = load_portfolio(dir.path(), "growth", SystemMode::Capital).unwrap_err();
        assert!(err.to_string().contains("Portfolio template not found"));
    }

    #[test]
    fn weights_must_sum_to_one() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(
            dir.path(),
            "mode,portfolio_id,ticker,weight\ncapital,core-60-40,SPY,0.6\ncapital,core-60-40,TLT,0.3\n",
        );
        let err = load_portfolio(dir.path(), "core-60-40", SystemMode::Capital).unwrap_err();
        assert!(err.to_string().contains("must sum to 1.0"));
    }

    #[test]
    fn lookback_years_becomes_integer() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path(), WEIGHTS);
        std::fs::write(
            dir.path().join(METADATA_FILE),
            "mode,portfolio_id,key,value\ncapital,core_60_40,lookback_years,20.0\ncapital,core_60_40,benchmark,SPY\n",
        )
        .unwrap();
        let spec = load_portfolio(dir.path(), "core-60-40", SystemMode::Capital).unwrap();
        assert_eq!(spec.metadata["lookback_years"], Value::from(20));
        assert_eq!(spec.metadata["benchmark"], Value::from("SPY"));
    }
}
