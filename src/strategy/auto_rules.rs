//! Rule derivation from historical median returns
//!
//! For each (weekday, hour) the median RT - DA return decides whether the
//! hour is worth bidding. Hours whose median clears the threshold are grouped
//! into one rule per weekday.

use chrono::Weekday;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BacktestError, BacktestResult};
use crate::strategy::rule::TimeBasedRule;
use crate::types::{parse_weekday, PriceObservation, WEEKDAYS};

/// Median return per (weekday, hour of day)
pub type MedianTable = HashMap<(Weekday, u32), f64>;

pub const MEDIAN_COLUMNS: [&str; 4] = [
    "settlementPoint_",
    "day_of_week_",
    "hour_",
    "return_DA_RT_median",
];

#[derive(Debug, Deserialize)]
struct RawMedianRow {
    #[serde(rename = "settlementPoint_")]
    settlement_point: String,
    #[serde(rename = "day_of_week_")]
    day_of_week: String,
    #[serde(rename = "hour_")]
    hour: u32,
    #[serde(rename = "return_DA_RT_median")]
    median: Option<f64>,
}

/// Weekday from a name ("Monday") or a Monday=0 index
fn parse_day_field(raw: &str) -> Option<Weekday> {
    parse_weekday(raw).or_else(|| {
        raw.trim()
            .parse::<usize>()
            .ok()
            .and_then(|idx| WEEKDAYS.get(idx).copied())
    })
}

/// Load the precomputed weekday/hour median table, keyed by node
pub fn load_weekday_hour_medians(
    path: impl AsRef<Path>,
) -> BacktestResult<BTreeMap<String, MedianTable>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| BacktestError::io(path, e))?;
    read_weekday_hour_medians(file, path)
}

pub fn read_weekday_hour_medians<R: Read>(
    reader: R,
    source: impl Into<PathBuf>,
) -> BacktestResult<BTreeMap<String, MedianTable>> {
    let source = source.into();
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = reader.headers()?.clone();
    let missing: Vec<String> = MEDIAN_COLUMNS
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

    let mut by_node: BTreeMap<String, MedianTable> = BTreeMap::new();
    for result in reader.deserialize() {
        let row: RawMedianRow = result?;
        let day = parse_day_field(&row.day_of_week).ok_or_else(|| {
            BacktestError::InvalidRule(format!("unknown weekday {:?}", row.day_of_week))
        })?;
        if let Some(median) = row.median {
            by_node
                .entry(row.settlement_point.trim().to_string())
                .or_default()
                .insert((day, row.hour), median);
        }
    }

    debug!(path = %source.display(), nodes = by_node.len(), "Loaded weekday/hour medians");
    Ok(by_node)
}

/// Median of RT - DA per (weekday, hour), computed from a node series
pub fn weekday_hour_medians(series: &[PriceObservation]) -> MedianTable {
    let mut buckets: HashMap<(Weekday, u32), Vec<f64>> = HashMap::new();
    for obs in series {
        let spread = obs.spread();
        if !spread.is_nan() {
            buckets
                .entry((obs.day_of_week, obs.hour))
                .or_default()
                .push(spread);
        }
    }

    buckets
        .into_iter()
        .filter_map(|(key, mut values)| median(&mut values).map(|m| (key, m)))
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// One rule per weekday (Monday first) holding every hour whose median
/// return is strictly above `threshold`. Weekdays with no such hour get no rule.
pub fn derive_rules(medians: &MedianTable, threshold: f64) -> Vec<TimeBasedRule> {
    WEEKDAYS
        .iter()
        .filter_map(|&day| {
            // Hours come from 0..24, so the rule needs no range validation
            let hours: BTreeSet<u32> = (0..24)
                .filter(|hour| {
                    medians
                        .get(&(day, *hour))
                        .map_or(false, |median| *median > threshold)
                })
                .collect();
            if hours.is_empty() {
                return None;
            }
            Some(TimeBasedRule {
                day_of_week: day,
                hours,
                season: None,
            })
        })
        .collect()
}
