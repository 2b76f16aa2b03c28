//! Time-indexed feature table consumed by the walk-forward engine.
//!
//! One row per trading day, strictly increasing by date. Every row carries
//! a realized return, a binary target, a dense set of numeric features and
//! zero or more integer regime labels. Regime labels may be missing for a
//! row (null) or absent from the schema altogether.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    #[error("Table is empty")]
    Empty,

    #[error("Column {name} has {got} rows, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("Dates must be strictly increasing: {previous} followed by {next}")]
    UnorderedDates { previous: NaiveDate, next: NaiveDate },

    #[error("Target at row {row} is {value}, expected 0 or 1")]
    InvalidTarget { row: usize, value: i64 },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
}

/// Column naming convention for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnLayout {
    /// Column holding the trade date.
    pub date_column: String,
    /// Binary label column (1 = next-period return above threshold).
    pub target_column: String,
    /// Realized return for the day, as a fraction.
    pub return_column: String,
    /// Prefix shared by every feature column.
    pub feature_prefix: String,
    /// Regime label columns, in signature order.
    pub regime_columns: Vec<String>,
}

impl ColumnLayout {
    /// Default layout for a ticker: `{T}_Target`, `{T}_Return`, `{T}_*` features,
    /// HMM and changepoint regime labels.
    pub fn for_ticker(ticker: &str) -> Self {
        Self {
            date_column: "Date".to_string(),
            target_column: format!("{}_Target", ticker),
            return_column: format!("{}_Return", ticker),
            feature_prefix: format!("{}_", ticker),
            regime_columns: vec![
                format!("{}_HMM_Regime", ticker),
                format!("{}_CP_Regime", ticker),
            ],
        }
    }

    /// Whether a column name is a model feature under this layout.
    pub fn is_feature(&self, name: &str) -> bool {
        name.starts_with(&self.feature_prefix)
            && name != self.target_column
            && name != self.return_column
            && !self.regime_columns.iter().any(|r| r == name)
    }
}

#[derive(Debug, Clone)]
struct RegimeColumn {
    name: String,
    labels: Vec<Option<i64>>,
}

/// Dense, date-ordered table of features, targets, returns and regime labels.
#[derive(Debug, Clone)]
pub struct TimeSeriesTable {
    dates: Vec<NaiveDate>,
    returns: Vec<f64>,
    targets: Vec<u8>,
    feature_names: Vec<String>,
    // Column-major: features[column][row].
    features: Vec<Vec<f64>>,
    regimes: Vec<RegimeColumn>,
}

impl TimeSeriesTable {
    /// Create a table from its mandatory columns. Features and regime labels
    /// are attached afterwards.
    pub fn new(
        dates: Vec<NaiveDate>,
        returns: Vec<f64>,
        targets: Vec<i64>,
    ) -> Result<Self, TableError> {
        if dates.is_empty() {
            return Err(TableError::Empty);
        }
        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(TableError::UnorderedDates {
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }
        check_len("returns", dates.len(), returns.len())?;
        check_len("targets", dates.len(), targets.len())?;

        let targets = targets
            .into_iter()
            .enumerate()
            .map(|(row, value)| match value {
                0 => Ok(0u8),
                1 => Ok(1u8),
                _ => Err(TableError::InvalidTarget { row, value }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dates,
            returns,
            targets,
            feature_names: Vec::new(),
            features: Vec::new(),
            regimes: Vec::new(),
        })
    }

    /// Attach a numeric feature column.
    pub fn with_feature(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, TableError> {
        let name = name.into();
        check_len(&name, self.len(), values.len())?;
        if self.feature_names.contains(&name) {
            return Err(TableError::DuplicateColumn(name));
        }
        self.feature_names.push(name);
        self.features.push(values);
        Ok(self)
    }

    /// Attach a regime label column. `None` marks a row without a label.
    pub fn with_regime(
        mut self,
        name: impl Into<String>,
        labels: Vec<Option<i64>>,
    ) -> Result<Self, TableError> {
        let name = name.into();
        check_len(&name, self.len(), labels.len())?;
        if self.regimes.iter().any(|c| c.name == name) {
            return Err(TableError::DuplicateColumn(name));
        }
        self.regimes.push(RegimeColumn { name, labels });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn date(&self, index: usize) -> NaiveDate {
        self.dates[index]
    }

    pub fn day_return(&self, index: usize) -> f64 {
        self.returns[index]
    }

    pub fn target(&self, index: usize) -> u8 {
        self.targets[index]
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Borrow a single row.
    pub fn row(&self, index: usize) -> TableRow<'_> {
        TableRow { table: self, index }
    }

    /// Feature vector for one row, in `feature_names` order.
    pub fn feature_row(&self, index: usize) -> Vec<f64> {
        self.features.iter().map(|column| column[index]).collect()
    }

    /// Row-major feature matrix and target vector for the inclusive range
    /// `[start, end]`.
    pub fn training_slice(&self, start: usize, end: usize) -> (Vec<Vec<f64>>, Vec<u8>) {
        let x = (start..=end).map(|i| self.feature_row(i)).collect();
        let y = self.targets[start..=end].to_vec();
        (x, y)
    }
}

/// Read-only view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    table: &'a TimeSeriesTable,
    index: usize,
}

impl<'a> TableRow<'a> {
    pub fn date(&self) -> NaiveDate {
        self.table.dates[self.index]
    }

    /// Regime label for a column, `None` if the column is absent or null.
    pub fn regime_label(&self, name: &str) -> Option<i64> {
        self.table
            .regimes
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.labels[self.index])
    }
}

fn check_len(name: &str, expected: usize, got: usize) -> Result<(), TableError> {
    if expected != got {
        return Err(TableError::LengthMismatch {
            name: name.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn test_layout_for_ticker() {
        let layout = ColumnLayout::for_ticker("SPY");
        assert_eq!(layout.target_column, "SPY_Target");
        assert_eq!(layout.return_column, "SPY_Return");
        assert!(layout.is_feature("SPY_RSI"));
        assert!(!layout.is_feature("SPY_Target"));
        assert!(!layout.is_feature("SPY_Return"));
        assert!(!layout.is_feature("SPY_HMM_Regime"));
        assert!(!layout.is_feature("QQQ_RSI"));
    }

    #[test]
    fn test_rejects_unordered_dates() {
        let mut d = dates(3);
        d.swap(1, 2);
        let err = TimeSeriesTable::new(d, vec![0.0; 3], vec![0; 3]).unwrap_err();
        assert!(matches!(err, TableError::UnorderedDates { .. }));
    }

    #[test]
    fn test_rejects_duplicate_dates() {
        let mut d = dates(3);
        d[2] = d[1];
        assert!(TimeSeriesTable::new(d, vec![0.0; 3], vec![0; 3]).is_err());
    }

    #[test]
    fn test_rejects_non_binary_target() {
        let err = TimeSeriesTable::new(dates(2), vec![0.0; 2], vec![0, 2]).unwrap_err();
        assert_eq!(err, TableError::InvalidTarget { row: 1, value: 2 });
    }

    #[test]
    fn test_length_mismatch() {
        let table = TimeSeriesTable::new(dates(3), vec![0.0; 3], vec![0; 3]).unwrap();
        let err = table.with_feature("SPY_RSI", vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, TableError::LengthMismatch { .. }));
    }

    #[test]
    fn test_training_slice() {
        let table = TimeSeriesTable::new(dates(4), vec![0.0; 4], vec![0, 1, 0, 1])
            .unwrap()
            .with_feature("a", vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
            .with_feature("b", vec![10.0, 20.0, 30.0, 40.0])
            .unwrap();

        let (x, y) = table.training_slice(1, 2);
        assert_eq!(x, vec![vec![2.0, 20.0], vec![3.0, 30.0]]);
        assert_eq!(y, vec![1, 0]);
        assert_eq!(table.feature_row(3), vec![4.0, 40.0]);
    }

    #[test]
    fn test_row_regime_lookup() {
        let table = TimeSeriesTable::new(dates(2), vec![0.0; 2], vec![0, 1])
            .unwrap()
            .with_regime("SPY_HMM_Regime", vec![Some(2), None])
            .unwrap();

        let row = table.row(0);
        assert_eq!(row.regime_label("SPY_HMM_Regime"), Some(2));
        assert_eq!(table.row(1).regime_label("SPY_HMM_Regime"), None);
        assert_eq!(row.regime_label("SPY_CP_Regime"), None);
    }
}
