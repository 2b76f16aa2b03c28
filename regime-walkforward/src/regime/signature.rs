//! Regime signatures.
//!
//! A signature combines the labels of every configured regime column for one
//! row, in a fixed order. It is kept structured (`RegimeKey`) inside the
//! engine and only rendered as `"1|0"` / `"NA|2"` text at the output boundary.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::data::{TableRow, TimeSeriesTable};

/// Token rendered for a regime slot without a label.
pub const MISSING_LABEL: &str = "NA";

/// Separator between slots in the rendered signature.
pub const SLOT_SEPARATOR: &str = "|";

/// Structured regime signature: one optional label per configured column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegimeKey(Vec<Option<i64>>);

impl RegimeKey {
    pub fn new(labels: Vec<Option<i64>>) -> Self {
        Self(labels)
    }

    /// Build the key for a row. A column absent from the row's schema, or a
    /// null label, yields an empty slot rather than an error.
    pub fn from_row(row: &TableRow<'_>, columns: &[String]) -> Self {
        Self::new(columns.iter().map(|c| row.regime_label(c)).collect())
    }
}

impl fmt::Display for RegimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(SLOT_SEPARATOR)?;
            }
            match label {
                Some(value) => write!(f, "{}", value)?,
                None => f.write_str(MISSING_LABEL)?,
            }
        }
        Ok(())
    }
}

impl Serialize for RegimeKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Rendered signature string for a row.
pub fn regime_signature(row: &TableRow<'_>, columns: &[String]) -> String {
    RegimeKey::from_row(row, columns).to_string()
}

/// Whether the regime changed between `index - 1` and `index`.
/// Always false for the first row.
pub fn regime_changed(table: &TimeSeriesTable, index: usize, columns: &[String]) -> bool {
    if index < 1 {
        return false;
    }
    RegimeKey::from_row(&table.row(index - 1), columns)
        != RegimeKey::from_row(&table.row(index), columns)
}
