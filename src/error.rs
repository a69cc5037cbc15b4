//! Error taxonomy for the backtester library
//!
//! Application code (config loading, the CLI runner) wraps these in
//! `anyhow::Error` with context; library functions return them directly.

use std::path::PathBuf;

use thiserror::Error;

pub type BacktestResult<T> = std::result::Result<T, BacktestError>;

#[derive(Debug, Error)]
pub enum BacktestError {
    /// The settlement point has no rows in the price table
    #[error("settlement point {node} not found in {path}")]
    NodeNotFound { node: String, path: PathBuf },

    /// The settlement point has no entry in the rule table
    #[error("settlement point {0} has no rule definition")]
    UnknownNode(String),

    #[error("{path} is missing required column(s): {}", columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("unparseable timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid rule: {0}")]
    InvalidRule(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BacktestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BacktestError::Io {
            path: path.into(),
            source,
        }
    }
}
