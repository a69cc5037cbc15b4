//! Configuration section types

use serde::Deserialize;
use std::path::PathBuf;

use crate::strategy::RuleCombinator;

/// Input locations
#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    /// Flat hourly price table (settlementPoint, date, SPP_DA, SPP_RT)
    pub input_path: PathBuf,
    /// Precomputed weekday/hour median returns
    pub weekday_hour_path: PathBuf,
    /// YAML node -> rules table
    pub nodes_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
    pub save_csv: bool,
    pub save_chart: bool,
    pub save_summary: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// USD subtracted from the trailing mean RT price
    pub margin: f64,
    pub lookback_start_days: i64,
    pub lookback_end_days: i64,
    pub rule_combinator: RuleCombinator,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Show DA +/- 1 as the bid in outputs, after awards are computed
    pub display_bid_overwrite: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoRulesConfig {
    /// Hours qualify when their median RT - DA return is strictly above this
    pub median_return_threshold: f64,
}
