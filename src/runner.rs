//! Batch runner
//!
//! Wires loader -> strategy -> evaluator -> reporter -> persistence for one
//! node or for every node of a batch. In a batch, a node missing from the
//! price table or the rule table is logged and skipped; any other failure
//! (I/O, CSV, chart) aborts the run.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::backtesting::run_backtest;
use crate::config::AppConfig;
use crate::data::PriceTable;
use crate::error::BacktestError;
use crate::persistence::ResultsStore;
use crate::results::{chart::render_chart, Results};
use crate::strategy::{
    derive_rules, load_weekday_hour_medians, weekday_hour_medians, MedianTable, NodeRuleTable,
    Strategy, TimeBasedRule,
};

/// Where auto mode takes its weekday/hour medians from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MedianSource {
    /// Precomputed `data.weekday_hour_path` table
    File,
    /// Computed from each node's own price history
    History,
}

pub struct Runner {
    config: AppConfig,
    store: ResultsStore,
}

impl Runner {
    pub fn new(config: AppConfig) -> Result<Self> {
        let store = ResultsStore::new(&config.output.results_dir).with_context(|| {
            format!(
                "Failed to create results directory {}",
                config.output.results_dir.display()
            )
        })?;
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &ResultsStore {
        &self.store
    }

    fn load_prices(&self) -> Result<PriceTable> {
        let path = &self.config.data.input_path;
        PriceTable::load(path)
            .with_context(|| format!("Failed to load price table {}", path.display()))
    }

    fn load_rule_table(&self) -> Result<NodeRuleTable> {
        let path = &self.config.data.nodes_file;
        NodeRuleTable::load(path)
            .with_context(|| format!("Failed to load node rule table {}", path.display()))
    }

    /// Evaluate one node with the given rules, then report and persist
    pub fn evaluate_node(
        &self,
        prices: &PriceTable,
        node: &str,
        rules: Vec<TimeBasedRule>,
    ) -> Result<Results> {
        if rules.is_empty() {
            warn!(node, "Empty rule set, the strategy will never bid");
        }

        // The strategy and the evaluator each get their own copy of the series
        let strategy_series = prices.node_data(node)?;
        let node_series = prices.node_data(node)?;
        let strategy =
            Strategy::with_params(node, strategy_series, rules, self.config.strategy_params());

        let rows = run_backtest(&node_series, &strategy, &self.config.backtest_config());
        let results = Results::new(node, rows);

        println!("{}", results);
        info!(
            node,
            rows = results.summary.rows,
            hours_awarded = results.summary.hours_awarded,
            total_profit = results.summary.total_profit,
            "Node evaluated"
        );

        self.persist(&results)?;
        Ok(results)
    }

    fn persist(&self, results: &Results) -> Result<()> {
        let node = results.settlement_point.as_str();
        if self.config.output.save_csv {
            self.store
                .save_rows(node, &results.rows)
                .with_context(|| format!("Failed to save results CSV for {}", node))?;
        }
        if self.config.output.save_summary {
            self.store
                .save_summary(&results.summary)
                .with_context(|| format!("Failed to save summary for {}", node))?;
        }
        if self.config.output.save_chart && !results.rows.is_empty() {
            let path = self.store.chart_path(node);
            render_chart(&path, node, &results.rows)
                .with_context(|| format!("Failed to render chart for {}", node))?;
        }
        Ok(())
    }

    /// Evaluate one node from the rule table
    pub fn run_node(&self, node: &str) -> Result<Results> {
        let table = self.load_rule_table()?;
        let rules = table.rules_for(node)?;
        let prices = self.load_prices()?;
        self.evaluate_node(&prices, node, rules)
    }

    /// Evaluate every node of the rule table against one cached price table
    pub fn run_all(&self) -> Result<Vec<Results>> {
        let table = self.load_rule_table()?;
        let prices = self.load_prices()?;
        let nodes = table.nodes();
        info!(nodes = nodes.len(), "Evaluating rule table nodes");

        run_batch(&nodes, |node| {
            let rules = table.rules_for(node)?;
            self.evaluate_node(&prices, node, rules)
        })
    }

    /// Derive rules from median returns for every node in the price table
    pub fn run_auto(&self, source: MedianSource) -> Result<Vec<Results>> {
        let prices = self.load_prices()?;
        let threshold = self.config.auto_rules.median_return_threshold;

        let precomputed: BTreeMap<String, MedianTable> = match source {
            MedianSource::File => {
                let path = &self.config.data.weekday_hour_path;
                load_weekday_hour_medians(path).with_context(|| {
                    format!("Failed to load weekday/hour medians {}", path.display())
                })?
            }
            MedianSource::History => BTreeMap::new(),
        };

        let nodes = prices.nodes().to_vec();
        info!(nodes = nodes.len(), ?source, threshold, "Evaluating auto-derived rules");

        run_batch(&nodes, |node| {
            let rules = match source {
                MedianSource::File => match precomputed.get(node) {
                    Some(medians) => derive_rules(medians, threshold),
                    None => {
                        warn!(node, "No precomputed medians for node");
                        Vec::new()
                    }
                },
                MedianSource::History => {
                    derive_rules(&weekday_hour_medians(&prices.node_data(node)?), threshold)
                }
            };
            self.evaluate_node(&prices, node, rules)
        })
    }

    /// Nodes present in the price table, in first-seen order
    pub fn list_nodes(&self) -> Result<Vec<String>> {
        Ok(self.load_prices()?.nodes().to_vec())
    }
}

/// Missing-node errors are per-node data gaps; everything else is fatal
fn is_skippable(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<BacktestError>(),
        Some(BacktestError::NodeNotFound { .. } | BacktestError::UnknownNode(_))
    )
}

/// Run `eval` for each node. Missing nodes are skipped; the run fails if
/// every node was skipped. Any other error is returned immediately.
fn run_batch<F>(nodes: &[String], mut eval: F) -> Result<Vec<Results>>
where
    F: FnMut(&str) -> Result<Results>,
{
    let mut done = Vec::with_capacity(nodes.len());
    let mut skipped = 0usize;

    for node in nodes {
        match eval(node) {
            Ok(results) => done.push(results),
            Err(e) if is_skippable(&e) => {
                skipped += 1;
                warn!(node = %node, error = %format!("{:#}", e), "Skipping node");
            }
            Err(e) => {
                error!(node = %node, error = %format!("{:#}", e), "Node evaluation failed");
                return Err(e.context(format!("Batch aborted at node {}", node)));
            }
        }
    }

    if done.is_empty() && skipped > 0 {
        bail!("All {} nodes were skipped", skipped);
    }
    info!(succeeded = done.len(), skipped, "Batch complete");
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_skips_missing_nodes() {
        let nodes = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let mut seen = Vec::new();
        let result = run_batch(&nodes, |node| {
            seen.push(node.to_string());
            match node {
                "A" => Err(BacktestError::UnknownNode(node.to_string()).into()),
                "B" => Err(anyhow::Error::from(BacktestError::NodeNotFound {
                    node: node.to_string(),
                    path: "prices.csv".into(),
                })
                .context("Failed to evaluate B")),
                _ => Ok(Results::new(node, Vec::new())),
            }
        })
        .unwrap();

        assert_eq!(seen, vec!["A", "B", "C"]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].settlement_point, "C");
    }

    #[test]
    fn test_batch_propagates_io_failure() {
        let nodes = vec!["A".to_string(), "B".to_string()];
        let mut seen = Vec::new();
        let result = run_batch(&nodes, |node| {
            seen.push(node.to_string());
            let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
            Err(anyhow::Error::from(BacktestError::io("results/csv/A_results.csv", io))
                .context("Failed to save results CSV for A"))
        });

        assert!(result.is_err());
        assert_eq!(seen, vec!["A"], "batch must stop at the first fatal error");
    }

    #[test]
    fn test_batch_propagates_untyped_errors() {
        let nodes = vec!["A".to_string()];
        assert!(run_batch(&nodes, |_| bail!("boom")).is_err());
    }

    #[test]
    fn test_batch_fails_when_every_node_is_skipped() {
        let nodes = vec!["A".to_string()];
        assert!(run_batch(&nodes, |node| Err(BacktestError::UnknownNode(node.to_string()).into())).is_err());
    }

    #[test]
    fn test_empty_batch_is_ok() {
        assert!(run_batch(&[], |_| bail!("unreachable")).unwrap().is_empty());
    }
}
