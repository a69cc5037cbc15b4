//! SPP Backtest Library
//!
//! Backtests time-of-week virtual bids against day-ahead and real-time
//! settlement point prices, node by node.

pub mod backtesting;
pub mod config;
pub mod data;
pub mod error;
pub mod persistence;
pub mod results;
pub mod runner;
pub mod season;
pub mod strategy;
pub mod types;

pub use error::{BacktestError, BacktestResult};
