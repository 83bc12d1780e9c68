//! Price table loading and validation.
//!
//! Input is a wide CSV, `date,<SYM>,<SYM>...`, one row per observation. For a
//! set of required symbols the loader finds the effective window, which runs
//! from the first row where every required symbol has a price to the last
//! such row:
//! - gaps before the window are logged and dropped
//! - a gap inside the window is fatal
//! - prices must be finite and strictly positive
//!
//! The simulation samples the window to one row per calendar month.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use folio_core::domain::Prices;
use folio_core::hierarchy::Table;
use serde::{Deserialize, Serialize};

use crate::tables::{read_table, LoadError};

/// Dense, ascending prices for a fixed symbol set.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    symbols: Vec<String>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

/// Raw and effective coverage of a loaded price file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceStats {
    pub raw_start: NaiveDate,
    pub raw_end: NaiveDate,
    pub raw_rows: usize,
    pub effective_start: NaiveDate,
    pub effective_end: NaiveDate,
    pub effective_rows: usize,
}

impl PriceTable {
    /// Build a table directly; rows must already be ascending and dense.
    pub fn new(symbols: Vec<String>, dates: Vec<NaiveDate>, rows: Vec<Vec<f64>>) -> Self {
        Self {
            symbols,
            dates,
            rows,
        }
    }

    /// Validate a wide price table for `required` symbols.
    pub fn from_table(table: &Table, required: &[String]) -> Result<(Self, PriceStats), LoadError> {
        let missing: Vec<String> = std::iter::once("date")
            .chain(required.iter().map(String::as_str))
            .filter(|column| table.column(column).is_none())
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingSymbols(missing));
        }

        // Parse every row; a blank cell is a gap.
        let mut parsed: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            let raw_date = table.cell(row, "date");
            let date = parse_date(raw_date).ok_or_else(|| LoadError::InvalidDate {
                row: row + 1,
                value: raw_date.to_string(),
            })?;
            let values = required
                .iter()
                .map(|symbol| parse_price(table.cell(row, symbol), symbol, raw_date))
                .collect::<Result<Vec<_>, _>>()?;
            parsed.push((date, values));
        }
        parsed.sort_by_key(|(date, _)| *date);

        let (raw_start, raw_end) = match (parsed.first(), parsed.last()) {
            (Some(first), Some(last)) => (first.0, last.0),
            _ => return Err(LoadError::NoCompleteRows(required.to_vec())),
        };
        let complete = |values: &[Option<f64>]| values.iter().all(Option::is_some);
        let first = parsed.iter().position(|(_, v)| complete(v));
        let last = parsed.iter().rposition(|(_, v)| complete(v));
        let (first, last) = match (first, last) {
            (Some(f), Some(l)) => (f, l),
            _ => return Err(LoadError::NoCompleteRows(required.to_vec())),
        };

        let gaps: BTreeSet<String> = parsed[first..=last]
            .iter()
            .flat_map(|(_, values)| {
                values
                    .iter()
                    .zip(required)
                    .filter(|(v, _)| v.is_none())
                    .map(|(_, s)| s.clone())
            })
            .collect();
        if !gaps.is_empty() {
            return Err(LoadError::GapInWindow(gaps.into_iter().collect()));
        }
        if first > 0 {
            tracing::warn!(
                dropped = first,
                effective_start = %parsed[first].0,
                "gaps before effective start (likely inception alignment)"
            );
        }

        let window = &parsed[first..=last];
        let stats = PriceStats {
            raw_start,
            raw_end,
            raw_rows: parsed.len(),
            effective_start: window[0].0,
            effective_end: window[window.len() - 1].0,
            effective_rows: window.len(),
        };
        let dates = window.iter().map(|(d, _)| *d).collect();
        let rows = window
            .iter()
            .map(|(_, values)| values.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        Ok((Self::new(required.to_vec(), dates, rows), stats))
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Prices of row `index` keyed by symbol.
    pub fn prices_at(&self, index: usize) -> Prices {
        self.rows
            .get(index)
            .map(|row| self.symbols.iter().cloned().zip(row.iter().copied()).collect())
            .unwrap_or_default()
    }

    /// Last observation of each calendar month.
    pub fn month_end_sample(&self) -> Self {
        let mut dates = Vec::new();
        let mut rows = Vec::new();
        for (i, date) in self.dates.iter().enumerate() {
            let month_ends_here = self
                .dates
                .get(i + 1)
                .map_or(true, |next| (next.year(), next.month()) != (date.year(), date.month()));
            if month_ends_here {
                dates.push(*date);
                rows.push(self.rows[i].clone());
            }
        }
        Self::new(self.symbols.clone(), dates, rows)
    }

    /// BLAKE3 over symbols, dates and price bits.
    pub fn dataset_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for symbol in &self.symbols {
            hasher.update(symbol.as_bytes());
            hasher.update(&[0]);
        }
        for (date, row) in self.dates.iter().zip(&self.rows) {
            hasher.update(date.to_string().as_bytes());
            for px in row {
                hasher.update(&px.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Load and validate a price CSV for `required` symbols.
pub fn load_prices(path: &Path, required: &[String]) -> Result<(PriceTable, PriceStats), LoadError> {
    let table = read_table(path, "Price dataset")?;
    let (prices, stats) = PriceTable::from_table(&table, required)?;
    tracing::info!(
        raw_start = %stats.raw_start,
        raw_end = %stats.raw_end,
        raw_rows = stats.raw_rows,
        effective_start = %stats.effective_start,
        effective_end = %stats.effective_end,
        effective_rows = stats.effective_rows,
        tickers = %required.join(", "),
        "loaded prices"
    );
    Ok((prices, stats))
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_price(raw: &str, symbol: &str, date: &str) -> Result<Option<f64>, LoadError> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let invalid = || LoadError::InvalidPrice {
        symbol: symbol.to_string(),
        date: date.to_string(),
        value: raw.to_string(),
    };
    let px: f64 = raw.parse().map_err(|_| invalid())?;
    if !px.is_finite() || px <= 0.0 {
        return Err(invalid());
    }
    Ok(Some(px))
}
