//! Node Data Loader
//!
//! Reads the flat historical price table and hands out per-node series:
//! - Filters rows to one settlement point
//! - Adds calendar fields (weekday, hour, month, quarter season)
//! - Sorts by timestamp and drops duplicate hours
//!
//! [`PriceTable`] parses the file once and can serve every node of a batch
//! run; [`load_node_data`] re-reads the file per call.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{BacktestError, BacktestResult};
use crate::types::PriceObservation;

/// Columns the price table must carry
pub const REQUIRED_COLUMNS: [&str; 4] = ["settlementPoint", "date", "SPP_DA", "SPP_RT"];

/// Raw row of the price table; extra columns are ignored
#[derive(Debug, Deserialize)]
struct RawPriceRow {
    #[serde(rename = "settlementPoint")]
    settlement_point: String,
    date: String,
    #[serde(rename = "SPP_DA")]
    spp_da: Option<f64>,
    #[serde(rename = "SPP_RT")]
    spp_rt: Option<f64>,
}

/// Parse a timestamp in any of the layouts found in price exports.
///
/// Offsets are dropped and the wall-clock time is kept.
pub fn parse_timestamp(raw: &str) -> BacktestResult<NaiveDateTime> {
    let value = raw.trim();

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.naive_local());
    }
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(ts.naive_local());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| BacktestError::InvalidTimestamp(value.to_string()))
}

/// Parsed price table, grouped by settlement point
#[derive(Debug, Clone)]
pub struct PriceTable {
    source: PathBuf,
    /// Node names in first-seen order
    nodes: Vec<String>,
    by_node: HashMap<String, Vec<PriceObservation>>,
}

impl PriceTable {
    /// Load and parse the whole table from disk
    pub fn load(path: impl AsRef<Path>) -> BacktestResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| BacktestError::io(path, e))?;
        let table = Self::from_reader(file, path)?;
        info!(
            path = %path.display(),
            nodes = table.nodes.len(),
            "Loaded price table"
        );
        Ok(table)
    }

    /// Parse a table from any reader; `source` is used in error messages
    pub fn from_reader<R: Read>(reader: R, source: impl Into<PathBuf>) -> BacktestResult<Self> {
        let source = source.into();
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = reader.headers()?.clone();
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h.trim() == **col))
            .map(|col| col.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(BacktestError::MissingColumns {
                path: source,
                columns: missing,
            });
        }

        let mut nodes = Vec::new();
        let mut by_node: HashMap<String, Vec<PriceObservation>> = HashMap::new();

        for result in reader.deserialize() {
            let raw: RawPriceRow = result?;
            let timestamp = parse_timestamp(&raw.date)?;
            let node = raw.settlement_point.trim();

            if !by_node.contains_key(node) {
                nodes.push(node.to_string());
            }
            by_node.entry(node.to_string()).or_default().push(PriceObservation::new(
                node,
                timestamp,
                raw.spp_da.unwrap_or(f64::NAN),
                raw.spp_rt.unwrap_or(f64::NAN),
            ));
        }

        for (node, series) in by_node.iter_mut() {
            sort_and_dedup(node, series);
        }

        Ok(Self {
            source,
            nodes,
            by_node,
        })
    }

    /// Settlement points present in the table, in first-seen order
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Enriched, chronologically ordered series for one node
    pub fn node_data(&self, node: &str) -> BacktestResult<Vec<PriceObservation>> {
        match self.by_node.get(node) {
            Some(series) if !series.is_empty() => {
                debug!(node, rows = series.len(), "Serving node series");
                Ok(series.clone())
            }
            _ => Err(BacktestError::NodeNotFound {
                node: node.to_string(),
                path: self.source.clone(),
            }),
        }
    }
}

/// Read the table from disk and return one node's series
pub fn load_node_data(path: impl AsRef<Path>, node: &str) -> BacktestResult<Vec<PriceObservation>> {
    PriceTable::load(path)?.node_data(node)
}

fn sort_and_dedup(node: &str, series: &mut Vec<PriceObservation>) {
    series.sort_by_key(|obs| obs.timestamp);
    let before = series.len();
    series.dedup_by_key(|obs| obs.timestamp);
    let dropped = before - series.len();
    if dropped > 0 {
        warn!(node, dropped, "Dropped duplicate timestamps, kept first occurrence");
    }
}
