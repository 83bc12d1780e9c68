//! In-memory string tables and the fail-fast checks shared by every input file.
//!
//! Loaders (CSV in the runner, literals in tests) produce a `Table`; the
//! hierarchy and definition builders validate it here before reading rows.
//! Cells are compared trimmed, and a cell that is empty after trimming is blank.

use std::collections::BTreeSet;

/// Table validation failures. Offending values are reported sorted and
/// deduplicated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Malformed {table}: missing required columns: {columns:?}")]
    MissingColumns { table: String, columns: Vec<String> },
    #[error("Malformed {table}: file contains no rows")]
    Empty { table: String },
    #[error("Malformed {table}: column '{column}' contains blank values")]
    BlankValues { table: String, column: String },
    #[error("Malformed {table}: {column} must be unique; duplicates: {duplicates:?}")]
    DuplicateValues {
        table: String,
        column: String,
        duplicates: Vec<String>,
    },
    #[error("Invalid weight_type values: {0:?}")]
    InvalidWeightType(Vec<String>),
    #[error("Duplicate (portfolio_name, node_id) entries found: {0:?}")]
    DuplicatePairs(Vec<(String, String)>),
}

/// A header row plus string cells. Short rows read as blank past their end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    label: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// `label` names the table in error messages (e.g. "hierarchy CSV").
    pub fn new(label: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            label: label.into(),
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    /// Build from string literals; handy for tests and fixtures.
    pub fn from_rows(label: &str, headers: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            label,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Trimmed cell, or "" when the column or cell is absent.
    pub fn cell(&self, row: usize, column: &str) -> &str {
        self.column(column)
            .and_then(|c| self.rows.get(row)?.get(c))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    /// Trimmed values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Vec<&str> {
        (0..self.rows.len()).map(|r| self.cell(r, column)).collect()
    }

    // ─── Checks ──────────────────────────────────────────────────────

    pub fn require_columns(&self, required: &[&str]) -> Result<(), ValidationError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|c| self.column(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::MissingColumns {
                table: self.label.clone(),
                columns: missing,
            })
        }
    }

    pub fn require_rows(&self) -> Result<(), ValidationError> {
        if self.rows.is_empty() {
            return Err(ValidationError::Empty {
                table: self.label.clone(),
            });
        }
        Ok(())
    }

    /// Checks columns in the order given and reports the first with a blank.
    pub fn require_non_blank(&self, columns: &[&str]) -> Result<(), ValidationError> {
        for column in columns {
            if self.column_values(column).iter().any(|v| v.is_empty()) {
                return Err(ValidationError::BlankValues {
                    table: self.label.clone(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn require_unique(&self, column: &str) -> Result<(), ValidationError> {
        let mut seen = BTreeSet::new();
        let duplicates: BTreeSet<String> = self
            .column_values(column)
            .into_iter()
            .filter(|v| !seen.insert(*v))
            .map(str::to_string)
            .collect();
        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::DuplicateValues {
                table: self.label.clone(),
                column: column.to_string(),
                duplicates: duplicates.into_iter().collect(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            "hierarchy CSV",
            &["a", " b ", "c"],
            &[&["1", " x ", "k"], &["2", "", "k"], &["3", "y"]],
        )
    }

    #[test]
    fn cells_are_trimmed_and_short_rows_blank() {
        let t = sample();
        assert_eq!(t.cell(0, "b"), "x");
        assert_eq!(t.cell(2, "c"), "");
        assert_eq!(t.cell(0, "zzz"), "");
    }

    #[test]
    fn missing_columns_listed_in_required_order() {
        let err = sample().require_columns(&["z", "a", "y"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Malformed hierarchy CSV: missing required columns: [\"z\", \"y\"]"
        );
    }

    #[test]
    fn first_blank_column_reported() {
        let err = sample().require_non_blank(&["a", "b", "c"]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BlankValues {
                table: "hierarchy CSV".into(),
                column: "b".into(),
            }
        );
    }

    #[test]
    fn duplicates_sorted_and_deduplicated() {
        let t = Table::from_rows("t", &["id"], &[&["b"], &["a"], &["b"], &["a"], &["b"], &["c"]]);
        match t.require_unique("id").unwrap_err() {
            ValidationError::DuplicateValues { duplicates, .. } => {
                assert_eq!(duplicates, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected DuplicateValues, got {:?}", other),
        }
    }

    #[test]
    fn empty_table_fails_require_rows() {
        let t = Table::from_rows("t", &["id"], &[]);
        assert!(matches!(t.require_rows(), Err(ValidationError::Empty { .. })));
    }
}
