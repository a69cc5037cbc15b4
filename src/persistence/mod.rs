//! CSV Persistence Module
//!
//! Stores per-node backtest output under a results directory:
//! - `csv/<NODE>_results.csv`: every evaluated row with derived columns
//! - `img/<NODE>_results.png`: chart path (rendered by `results::chart`)
//! - `json/<NODE>_summary.json`: performance summary
//!
//! Floats go through `csv`'s shortest round-trip formatting, so `-inf`,
//! `inf` and `NaN` bids are written literally and read back unchanged.

use csv::{ReaderBuilder, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::data::parse_timestamp;
use crate::error::{BacktestError, BacktestResult};
use crate::results::PerformanceSummary;
use crate::types::{parse_weekday, EvaluationRecord, EvaluationRow, PriceObservation};

/// Results directory layout and writers
#[derive(Debug, Clone)]
pub struct ResultsStore {
    results_dir: PathBuf,
}

impl ResultsStore {
    /// Create the results directory tree if needed
    pub fn new(results_dir: impl Into<PathBuf>) -> BacktestResult<Self> {
        let results_dir = results_dir.into();
        for sub in ["csv", "img", "json"] {
            let dir = results_dir.join(sub);
            fs::create_dir_all(&dir).map_err(|e| BacktestError::io(&dir, e))?;
        }
        Ok(Self { results_dir })
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn csv_path(&self, node: &str) -> PathBuf {
        self.results_dir
            .join("csv")
            .join(format!("{}_results.csv", node))
    }

    pub fn chart_path(&self, node: &str) -> PathBuf {
        self.results_dir
            .join("img")
            .join(format!("{}_results.png", node))
    }

    pub fn summary_path(&self, node: &str) -> PathBuf {
        self.results_dir
            .join("json")
            .join(format!("{}_summary.json", node))
    }

    /// Write all rows of a node, replacing any previous file
    pub fn save_rows(&self, node: &str, rows: &[EvaluationRow]) -> BacktestResult<PathBuf> {
        let path = self.csv_path(node);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| BacktestError::io(&path, e))?;

        let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
        for row in rows {
            writer.serialize(EvaluationRecord::from(row))?;
        }
        writer.flush().map_err(|e| BacktestError::io(&path, e))?;

        info!(node, rows = rows.len(), path = %path.display(), "Saved results CSV");
        Ok(path)
    }

    /// Read a node's results CSV back into rows
    pub fn load_rows(&self, node: &str) -> BacktestResult<Vec<EvaluationRow>> {
        let path = self.csv_path(node);
        let file = File::open(&path).map_err(|e| BacktestError::io(&path, e))?;
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        let mut rows = Vec::new();
        for result in reader.deserialize() {
            let record: EvaluationRecord = result?;
            rows.push(row_from_record(record)?);
        }
        Ok(rows)
    }

    pub fn save_summary(&self, summary: &PerformanceSummary) -> BacktestResult<PathBuf> {
        let path = self.summary_path(&summary.settlement_point);
        let json = serde_json::to_string_pretty(summary)?;
        fs::write(&path, json).map_err(|e| BacktestError::io(&path, e))?;
        Ok(path)
    }

    pub fn load_summary(&self, node: &str) -> BacktestResult<PerformanceSummary> {
        let path = self.summary_path(node);
        let raw = fs::read_to_string(&path).map_err(|e| BacktestError::io(&path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn row_from_record(record: EvaluationRecord) -> BacktestResult<EvaluationRow> {
    let timestamp = parse_timestamp(&record.date)?;
    let mut observation =
        PriceObservation::new(&record.settlement_point, timestamp, record.spp_da, record.spp_rt);

    // Stored calendar columns win over recomputed ones when they parse
    if let Some(day) = parse_weekday(&record.day_of_week) {
        observation.day_of_week = day;
    }

    Ok(EvaluationRow {
        observation,
        bid_price: record.bid_price,
        display_bid_price: record.display_bid_price,
        awarded: record.awarded != 0,
        profit: record.profit,
        rules: record.rules,
        cum_profit: record.cum_profit,
        cum_awarded: record.cum_awarded,
    })
}
