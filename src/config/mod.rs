//! Configuration management for the backtester
//!
//! Loads defaults, optional YAML files and environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::backtesting::BacktestConfig;
use crate::strategy::{RuleCombinator, StrategyParams};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub data: DataConfig,
    pub output: OutputConfig,
    pub strategy: StrategyConfig,
    pub report: ReportConfig,
    pub auto_rules: AutoRulesConfig,
}

impl AppConfig {
    /// Load configuration. `path` is an explicit file layered over
    /// `config/default` and `config/local`, below environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let mut builder = Config::builder()
            // Data defaults
            .set_default("data.input_path", "./data/virtual_trading_data.csv")?
            .set_default(
                "data.weekday_hour_path",
                "./data/virtual_trading_weekday_hour.csv",
            )?
            .set_default("data.nodes_file", "./config/nodes.yaml")?
            // Output defaults
            .set_default("output.results_dir", "./results")?
            .set_default("output.save_csv", true)?
            .set_default("output.save_chart", true)?
            .set_default("output.save_summary", true)?
            // Strategy defaults
            .set_default("strategy.margin", 5.0)?
            .set_default("strategy.lookback_start_days", 7)?
            .set_default("strategy.lookback_end_days", 2)?
            .set_default("strategy.rule_combinator", "all")?
            // Report defaults
            .set_default("report.display_bid_overwrite", true)?
            // Auto rule defaults
            .set_default("auto_rules.median_return_threshold", 1.0)?
            // Load config files if they exist
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let config = builder
            // Override with environment variables (SPP_BACKTEST__*)
            .add_source(Environment::with_prefix("SPP_BACKTEST").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject settings that would make every lookback window empty
    pub fn validate(&self) -> Result<()> {
        if self.strategy.lookback_start_days < self.strategy.lookback_end_days {
            bail!(
                "strategy.lookback_start_days ({}) must be >= strategy.lookback_end_days ({})",
                self.strategy.lookback_start_days,
                self.strategy.lookback_end_days
            );
        }
        if !self.strategy.margin.is_finite() {
            bail!("strategy.margin must be finite");
        }
        Ok(())
    }

    pub fn strategy_params(&self) -> StrategyParams {
        StrategyParams {
            margin: self.strategy.margin,
            lookback_start_days: self.strategy.lookback_start_days,
            lookback_end_days: self.strategy.lookback_end_days,
            combinator: self.strategy.rule_combinator,
        }
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            display_bid_overwrite: self.report.display_bid_overwrite,
        }
    }

    /// One-line digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "input={} nodes_file={} results={} margin={:.2} lookback={}..{}d combinator={} overwrite={}",
            self.data.input_path.display(),
            self.data.nodes_file.display(),
            self.output.results_dir.display(),
            self.strategy.margin,
            self.strategy.lookback_start_days,
            self.strategy.lookback_end_days,
            self.strategy.rule_combinator,
            self.report.display_bid_overwrite
        )
    }

    pub fn uses_any_combinator(&self) -> bool {
        self.strategy.rule_combinator == RuleCombinator::Any
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_config_dir(test_name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "spp_backtest_config_{}_{}",
            test_name,
            uuid::Uuid::new_v4()
        ))
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load(None).unwrap();
        let params = config.strategy_params();
        assert_eq!(params.margin, 5.0);
        assert_eq!(params.lookback_start_days, 7);
        assert_eq!(params.lookback_end_days, 2);
        assert_eq!(params.combinator, RuleCombinator::All);
        assert!(config.backtest_config().display_bid_overwrite);
        assert_eq!(config.auto_rules.median_return_threshold, 1.0);
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = temp_config_dir("explicit");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("run.yaml");
        fs::write(
            &path,
            "strategy:\n  margin: 2.5\n  rule_combinator: any\noutput:\n  save_chart: false\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.strategy.margin, 2.5);
        assert!(config.uses_any_combinator());
        assert!(!config.output.save_chart);
        assert!(config.output.save_csv);
        assert!(config.digest().contains("combinator=any"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_inverted_lookback_rejected() {
        let dir = temp_config_dir("lookback");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.yaml");
        fs::write(
            &path,
            "strategy:\n  lookback_start_days: 1\n  lookback_end_days: 3\n",
        )
        .unwrap();

        assert!(AppConfig::load(Some(&path)).is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = temp_config_dir("missing").join("nope.yaml");
        assert!(AppConfig::load(Some(&path)).is_err());
    }
}
