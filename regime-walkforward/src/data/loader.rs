//! CSV loader for engineered feature tables and written signal tables.
//!
//! The feature file holds one row per trading day with a `Date` column,
//! a realized return column, a binary target column, feature columns that
//! share the ticker prefix, and optional integer regime label columns
//! (HMM state, changepoint segment).

use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::{info, warn};

use super::types::{ColumnLayout, TableError, TimeSeriesTable};
use crate::walkforward::SignalRecord;

/// Columns of a signals table, in write order.
pub const SIGNAL_COLUMNS: &[&str] = &[
    "Date",
    "Signal",
    "DayReturn",
    "TradeCost",
    "PnL",
    "Equity",
    "Regime",
];

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Table error: {0}")]
    Table(#[from] TableError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loads feature and signal tables from CSV.
pub struct DataLoader;

impl DataLoader {
    /// Read a CSV file into a DataFrame.
    pub fn load_dataframe(path: &Path) -> Result<DataFrame, LoaderError> {
        if !path.exists() {
            return Err(LoaderError::FileNotFound(path.display().to_string()));
        }
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(10_000))
            .finish()?
            .collect()?;
        Ok(df)
    }

    /// Load a feature table from CSV using the given column layout.
    pub fn load_features(
        path: &Path,
        layout: &ColumnLayout,
    ) -> Result<TimeSeriesTable, LoaderError> {
        let df = Self::load_dataframe(path)?;
        info!("Loaded features: {} rows x {} columns", df.height(), df.width());
        Self::table_from_dataframe(&df, layout)
    }

    /// Convert a DataFrame into a dense, date-ordered table.
    ///
    /// Rows with a null feature, target or return are dropped. Regime columns
    /// listed in the layout but absent from the frame are left out; nulls in
    /// present regime columns are kept as missing labels.
    pub fn table_from_dataframe(
        df: &DataFrame,
        layout: &ColumnLayout,
    ) -> Result<TimeSeriesTable, LoaderError> {
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();

        for required in [&layout.date_column, &layout.target_column, &layout.return_column] {
            if !names.contains(required) {
                return Err(LoaderError::MissingColumn(required.clone()));
            }
        }
        if df.height() == 0 {
            return Err(TableError::Empty.into());
        }

        let feature_names: Vec<String> = names
            .iter()
            .filter(|n| layout.is_feature(n))
            .cloned()
            .collect();
        info!(
            "Detected {} feature columns with prefix {}",
            feature_names.len(),
            layout.feature_prefix
        );

        let dates = date_column(df, &layout.date_column)?;
        let returns = f64_column(df, &layout.return_column)?;
        let targets = i64_column(df, &layout.target_column)?;
        let features = feature_names
            .iter()
            .map(|name| f64_column(df, name))
            .collect::<Result<Vec<_>, _>>()?;
        let regimes = layout
            .regime_columns
            .iter()
            .filter(|name| names.contains(name))
            .map(|name| Ok((name.clone(), i64_column(df, name)?)))
            .collect::<Result<Vec<_>, LoaderError>>()?;

        // Keep dense rows only, then order by date.
        let mut keep: Vec<usize> = (0..df.height())
            .filter(|&row| {
                returns[row].is_some()
                    && targets[row].is_some()
                    && features.iter().all(|column| column[row].is_some())
            })
            .collect();
        let dropped = df.height() - keep.len();
        if dropped > 0 {
            warn!("Dropped {} rows with missing feature, target or return values", dropped);
        }
        keep.sort_by_key(|&row| dates[row]);

        let mut table = TimeSeriesTable::new(
            keep.iter().map(|&r| dates[r]).collect(),
            keep.iter().map(|&r| returns[r].unwrap_or_default()).collect(),
            keep.iter().map(|&r| targets[r].unwrap_or_default()).collect(),
        )?;
        for (name, column) in feature_names.into_iter().zip(features) {
            let values = keep.iter().map(|&r| column[r].unwrap_or_default()).collect();
            table = table.with_feature(name, values)?;
        }
        for (name, labels) in regimes {
            let values = keep.iter().map(|&r| labels[r]).collect();
            table = table.with_regime(name, values)?;
        }

        Ok(table)
    }

    /// Load a previously written signals table.
    pub fn load_signals(path: &Path) -> Result<Vec<SignalRecord>, LoaderError> {
        let df = Self::load_dataframe(path)?;
        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        for required in SIGNAL_COLUMNS {
            if !names.iter().any(|n| n == required) {
                return Err(LoaderError::MissingColumn(required.to_string()));
            }
        }

        let dates = date_column(&df, "Date")?;
        let signals = i64_column(&df, "Signal")?;
        let day_returns = f64_column(&df, "DayReturn")?;
        let trade_costs = f64_column(&df, "TradeCost")?;
        let pnls = f64_column(&df, "PnL")?;
        let equities = f64_column(&df, "Equity")?;
        let regime = df.column("Regime")?.cast(&DataType::String)?;
        let regimes: Vec<String> = regime
            .str()?
            .into_iter()
            .map(|s| s.unwrap_or("NA").to_string())
            .collect();

        let mut records = Vec::with_capacity(df.height());
        for row in 0..df.height() {
            let missing = || LoaderError::InvalidData(format!("Null value in signals row {}", row));
            records.push(SignalRecord {
                date: dates[row],
                signal: signals[row].ok_or_else(missing)? as i32,
                day_return: day_returns[row].ok_or_else(missing)?,
                trade_cost: trade_costs[row].ok_or_else(missing)?,
                pnl: pnls[row].ok_or_else(missing)?,
                equity: equities[row].ok_or_else(missing)?,
                regime: regimes[row].clone(),
            });
        }
        records.sort_by_key(|r| r.date);
        Ok(records)
    }
}

/// Parse a date column stored either as text or as a date dtype.
fn date_column(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>, LoaderError> {
    let column = df.column(name)?.cast(&DataType::String)?;
    column
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            let value = value
                .ok_or_else(|| LoaderError::InvalidData(format!("Missing date at row {}", row)))?;
            parse_date(value)
        })
        .collect()
}

/// Parse `YYYY-MM-DD`, ignoring any trailing time component.
fn parse_date(value: &str) -> Result<NaiveDate, LoaderError> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| LoaderError::InvalidData(format!("Invalid date {}: {}", value, e)))
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, LoaderError> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

fn i64_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, LoaderError> {
    let column = df.column(name)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2020-01-02").unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
        );
        assert_eq!(
            parse_date("2020-01-02 00:00:00").unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
        );
        assert!(parse_date("02/01/2020").is_err());
    }

    #[test]
    fn test_missing_file() {
        let layout = ColumnLayout::for_ticker("SPY");
        let err = DataLoader::load_features(Path::new("does/not/exist.csv"), &layout).unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound(_)));
    }

    #[test]
    fn test_load_features_detects_columns_and_sorts() {
        let file = write_csv(
            "Date,SPY_Return,SPY_Target,SPY_RSI,SPY_MACD,SPY_HMM_Regime,Other\n\
             2020-01-03,0.02,1,55.0,0.2,1,9\n\
             2020-01-02,0.01,0,50.0,0.1,0,9\n\
             2020-01-06,-0.01,0,45.0,,1,9\n",
        );
        let layout = ColumnLayout::for_ticker("SPY");
        let table = DataLoader::load_features(file.path(), &layout).unwrap();

        // Third row has a null feature and is dropped.
        assert_eq!(table.len(), 2);
        assert_eq!(table.feature_names(), &["SPY_RSI".to_string(), "SPY_MACD".to_string()]);
        assert_eq!(table.date(0), NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(table.day_return(1), 0.02);
        assert_eq!(table.target(1), 1);
        assert_eq!(table.row(1).regime_label("SPY_HMM_Regime"), Some(1));
        assert_eq!(table.row(0).regime_label("SPY_CP_Regime"), None);
    }

    #[test]
    fn test_load_features_requires_target() {
        let file = write_csv("Date,SPY_Return,SPY_RSI\n2020-01-02,0.01,50.0\n");
        let layout = ColumnLayout::for_ticker("SPY");
        let err = DataLoader::load_features(file.path(), &layout).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(c) if c == "SPY_Target"));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let file = write_csv("Date,SPY_Return,SPY_Target,SPY_RSI\n");
        let layout = ColumnLayout::for_ticker("SPY");
        let err = DataLoader::load_features(file.path(), &layout).unwrap_err();
        assert!(matches!(err, LoaderError::Table(TableError::Empty)));
    }
}
