//! Writes run artifacts: signals, equity curve and trade log as CSV, the
//! structured run log as JSON.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use super::engine::{SignalRecord, WalkForwardResult};
use super::error::WalkForwardError;
use crate::backtest::{EquityPoint, TradeEvent};
use crate::data::SIGNAL_COLUMNS;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Paths of the files written for one run.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub signals: PathBuf,
    pub equity_curve: PathBuf,
    pub trades: PathBuf,
    pub log: PathBuf,
}

pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    /// Create a writer, creating `output_dir` if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, WalkForwardError> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write every artifact of `result` under `label`.
    pub fn write(
        &self,
        result: &WalkForwardResult,
        label: &str,
    ) -> Result<OutputPaths, WalkForwardError> {
        let paths = OutputPaths {
            signals: self.output_dir.join(format!("signals_{}.csv", label)),
            equity_curve: self.output_dir.join(format!("equity_curve_{}.csv", label)),
            trades: self.output_dir.join(format!("trades_{}.csv", label)),
            log: self.output_dir.join(format!("backtest_log_{}.json", label)),
        };

        write_signals(&paths.signals, &result.signals)?;
        write_equity(&paths.equity_curve, &result.equity_curve)?;
        write_trades(&paths.trades, &result.trades)?;
        write_json(&paths.log, &result.log)?;

        info!("Saved signals to {}", paths.signals.display());
        info!("Saved equity curve to {}", paths.equity_curve.display());
        info!("Saved trades to {}", paths.trades.display());
        info!("Saved backtest log to {}", paths.log.display());
        Ok(paths)
    }

    /// Write any serializable value as pretty JSON under the output directory.
    pub fn write_json<T: Serialize>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf, WalkForwardError> {
        let path = self.output_dir.join(file_name);
        write_json(&path, value)?;
        info!("Saved {}", path.display());
        Ok(path)
    }
}

fn date_strings<I: IntoIterator<Item = chrono::NaiveDate>>(dates: I) -> Vec<String> {
    dates
        .into_iter()
        .map(|d| d.format(DATE_FORMAT).to_string())
        .collect()
}

pub fn write_signals(path: &Path, signals: &[SignalRecord]) -> Result<(), WalkForwardError> {
    let df = DataFrame::new(vec![
        Column::new(
            SIGNAL_COLUMNS[0].into(),
            date_strings(signals.iter().map(|s| s.date)),
        ),
        Column::new(
            SIGNAL_COLUMNS[1].into(),
            signals.iter().map(|s| s.signal).collect::<Vec<i32>>(),
        ),
        Column::new(
            SIGNAL_COLUMNS[2].into(),
            signals.iter().map(|s| s.day_return).collect::<Vec<f64>>(),
        ),
        Column::new(
            SIGNAL_COLUMNS[3].into(),
            signals.iter().map(|s| s.trade_cost).collect::<Vec<f64>>(),
        ),
        Column::new(
            SIGNAL_COLUMNS[4].into(),
            signals.iter().map(|s| s.pnl).collect::<Vec<f64>>(),
        ),
        Column::new(
            SIGNAL_COLUMNS[5].into(),
            signals.iter().map(|s| s.equity).collect::<Vec<f64>>(),
        ),
        Column::new(
            SIGNAL_COLUMNS[6].into(),
            signals.iter().map(|s| s.regime.clone()).collect::<Vec<String>>(),
        ),
    ])?;
    write_csv(path, df)
}

pub fn write_equity(path: &Path, equity: &[EquityPoint]) -> Result<(), WalkForwardError> {
    let df = DataFrame::new(vec![
        Column::new("Date".into(), date_strings(equity.iter().map(|p| p.date))),
        Column::new(
            "Equity".into(),
            equity.iter().map(|p| p.equity).collect::<Vec<f64>>(),
        ),
    ])?;
    write_csv(path, df)
}

pub fn write_trades(path: &Path, trades: &[TradeEvent]) -> Result<(), WalkForwardError> {
    let df = DataFrame::new(vec![
        Column::new("Date".into(), date_strings(trades.iter().map(|t| t.date))),
        Column::new(
            "prev_signal".into(),
            trades.iter().map(|t| t.prev_exposure).collect::<Vec<f64>>(),
        ),
        Column::new(
            "new_signal".into(),
            trades.iter().map(|t| t.new_exposure).collect::<Vec<f64>>(),
        ),
        Column::new(
            "trade_cost".into(),
            trades.iter().map(|t| t.trade_cost).collect::<Vec<f64>>(),
        ),
        Column::new(
            "equity_before".into(),
            trades.iter().map(|t| t.equity_before).collect::<Vec<f64>>(),
        ),
        Column::new(
            "equity_after".into(),
            trades.iter().map(|t| t.equity_after).collect::<Vec<f64>>(),
        ),
    ])?;
    write_csv(path, df)
}

fn write_csv(path: &Path, mut df: DataFrame) -> Result<(), WalkForwardError> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), WalkForwardError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataLoader;
    use chrono::NaiveDate;

    fn record(day: u32, signal: i32, regime: &str) -> SignalRecord {
        SignalRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            signal,
            day_return: 0.01,
            trade_cost: if signal == 1 { 0.001 } else { 0.0 },
            pnl: 0.009,
            equity: 1.009,
            regime: regime.to_string(),
        }
    }

    #[test]
    fn test_signals_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signals_test.csv");
        let records = vec![record(1, 1, "1|0"), record(4, 0, "NA|2")];
        write_signals(&path, &records).unwrap();

        let loaded = DataLoader::load_signals(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].date, records[0].date);
        assert_eq!(loaded[0].signal, 1);
        assert_eq!(loaded[0].regime, "1|0");
        assert_eq!(loaded[1].regime, "NA|2");
        assert!((loaded[1].equity - 1.009).abs() < 1e-12);
    }

    #[test]
    fn test_header_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.csv");
        let trades = vec![TradeEvent {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            prev_exposure: 0.0,
            new_exposure: 1.0,
            trade_cost: 0.001,
            equity_before: 1.0,
            equity_after: 0.999,
        }];
        write_trades(&path, &trades).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(
            header,
            "Date,prev_signal,new_signal,trade_cost,equity_before,equity_after"
        );
        assert!(contents.contains("2024-03-01"));
    }

    #[test]
    fn test_writer_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("results").join("run1");
        let writer = ResultWriter::new(&nested).unwrap();
        assert!(writer.output_dir().is_dir());

        let path = writer
            .write_json("summary.json", &serde_json::json!({ "ok": true }))
            .unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("\"ok\": true"));
    }
}
