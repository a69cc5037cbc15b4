//! Virtual Bid Strategy
//!
//! A strategy holds one node's price history and a list of time-of-week
//! rules. When the rules apply to an hour, the offer is the trailing mean of
//! realized RT prices (7 to 2 days back, both ends inclusive) minus a fixed
//! margin. Otherwise the strategy does not bid (-inf).
//!
//! Rules combine with AND by default. Most hand-built rule lists name one
//! rule per weekday, which under AND can never all hold at once; that
//! behaviour is kept and OR is only available through explicit config.

pub mod auto_rules;
pub mod rule;
pub mod strategy_trait;

pub use auto_rules::{derive_rules, load_weekday_hour_medians, weekday_hour_medians, MedianTable};
pub use rule::{NodeRuleTable, NodeRules, RuleSpec, TimeBasedRule};
pub use strategy_trait::BidStrategy;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::types::PriceObservation;

/// How a rule list is folded into one decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCombinator {
    /// Every rule must apply
    #[default]
    All,
    /// At least one rule must apply
    Any,
}

impl RuleCombinator {
    fn separator(&self) -> &'static str {
        match self {
            RuleCombinator::All => " & ",
            RuleCombinator::Any => " | ",
        }
    }
}

impl fmt::Display for RuleCombinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCombinator::All => write!(f, "all"),
            RuleCombinator::Any => write!(f, "any"),
        }
    }
}

/// Tunable strategy parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyParams {
    /// Discount subtracted from the trailing mean (USD/MWh)
    pub margin: f64,
    /// Window start, days before the operating hour
    pub lookback_start_days: i64,
    /// Window end, days before the operating hour
    pub lookback_end_days: i64,
    pub combinator: RuleCombinator,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            margin: 5.0,
            lookback_start_days: 7,
            lookback_end_days: 2,
            combinator: RuleCombinator::All,
        }
    }
}

/// Rule-gated offer pricing for one settlement point
#[derive(Debug, Clone)]
pub struct Strategy {
    settlement_point: String,
    /// Own copy of the node history, sorted by timestamp
    node_data: Vec<PriceObservation>,
    rules: Vec<TimeBasedRule>,
    params: StrategyParams,
}

impl Strategy {
    pub fn new(
        settlement_point: &str,
        node_data: Vec<PriceObservation>,
        rules: Vec<TimeBasedRule>,
    ) -> Self {
        Self::with_params(settlement_point, node_data, rules, StrategyParams::default())
    }

    pub fn with_params(
        settlement_point: &str,
        mut node_data: Vec<PriceObservation>,
        rules: Vec<TimeBasedRule>,
        params: StrategyParams,
    ) -> Self {
        // Window lookups binary-search on timestamp
        node_data.sort_by_key(|obs| obs.timestamp);
        debug!(
            node = settlement_point,
            rows = node_data.len(),
            rules = rules.len(),
            combinator = %params.combinator,
            "Strategy created"
        );
        Self {
            settlement_point: settlement_point.to_string(),
            node_data,
            rules,
            params,
        }
    }

    pub fn settlement_point(&self) -> &str {
        &self.settlement_point
    }

    pub fn rules(&self) -> &[TimeBasedRule] {
        &self.rules
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn node_data(&self) -> &[PriceObservation] {
        &self.node_data
    }

    /// Whether the rule list allows a bid at `ts`. An empty list never does.
    pub fn rules_apply(&self, ts: &NaiveDateTime) -> bool {
        if self.rules.is_empty() {
            return false;
        }
        match self.params.combinator {
            RuleCombinator::All => self.rules.iter().all(|rule| rule.is_applicable(ts)),
            RuleCombinator::Any => self.rules.iter().any(|rule| rule.is_applicable(ts)),
        }
    }

    /// Observations with timestamps in `[ts - start, ts - end]`
    pub fn lookback_window(&self, ts: &NaiveDateTime) -> &[PriceObservation] {
        let from = *ts - Duration::days(self.params.lookback_start_days);
        let to = *ts - Duration::days(self.params.lookback_end_days);
        if to < from {
            return &[];
        }

        let lo = self.node_data.partition_point(|obs| obs.timestamp < from);
        let hi = self.node_data.partition_point(|obs| obs.timestamp <= to);
        if hi <= lo {
            return &[];
        }
        &self.node_data[lo..hi]
    }

    /// Trailing mean RT price minus margin; NaN when the window has no prices
    pub fn offer_price(&self, ts: &NaiveDateTime) -> f64 {
        let (sum, count) = self
            .lookback_window(ts)
            .iter()
            .map(|obs| obs.spp_rt)
            .filter(|p| !p.is_nan())
            .fold((0.0, 0usize), |(sum, count), p| (sum + p, count + 1));

        if count == 0 {
            return f64::NAN;
        }
        sum / count as f64 - self.params.margin
    }

    /// Offer price when the rules apply, otherwise -inf (never awarded)
    pub fn apply_rules(&self, ts: &NaiveDateTime) -> f64 {
        if !self.rules_apply(ts) {
            return f64::NEG_INFINITY;
        }
        self.offer_price(ts)
    }

    /// Human-readable rule set, e.g. "Mon [20-23] & Tue [20]"
    pub fn rules_label(&self) -> String {
        if self.rules.is_empty() {
            return "no rules".to_string();
        }
        self.rules
            .iter()
            .map(|rule| rule.to_string())
            .collect::<Vec<_>>()
            .join(self.params.combinator.separator())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Weekday};

    /// 2024-01-01 (Monday) .. 2024-01-10 at 12:00, RT = day number * 10
    fn daily_series() -> Vec<PriceObservation> {
        (1..=10)
            .map(|day| {
                let ts = NaiveDate::from_ymd_opt(2024, 1, day)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap();
                PriceObservation::new("TEST_NODE", ts, 50.0, day as f64 * 10.0)
            })
            .collect()
    }

    fn noon(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_offer_price_uses_inclusive_window() {
        let strategy = Strategy::new("TEST_NODE", daily_series(), Vec::new());

        // Jan 10 noon: window Jan 3 noon ..= Jan 8 noon -> days 3..=8
        let expected = (30.0 + 40.0 + 50.0 + 60.0 + 70.0 + 80.0) / 6.0 - 5.0;
        assert!((strategy.offer_price(&noon(10)) - expected).abs() < 1e-12);
        assert_eq!(strategy.lookback_window(&noon(10)).len(), 6);
    }

    #[test]
    fn test_offer_price_without_history_is_nan() {
        let strategy = Strategy::new("TEST_NODE", daily_series(), Vec::new());
        // Jan 2 noon: window ends Dec 31, before the series starts
        assert!(strategy.offer_price(&noon(2)).is_nan());
        // Jan 3 noon: window ends Jan 1 noon, exactly one row
        assert_eq!(strategy.offer_price(&noon(3)), 10.0 - 5.0);
    }

    #[test]
    fn test_offer_price_skips_nan_prices() {
        let mut series = daily_series();
        series[3].spp_rt = f64::NAN; // Jan 4
        let strategy = Strategy::new("TEST_NODE", series, Vec::new());

        let expected = (30.0 + 50.0 + 60.0 + 70.0 + 80.0) / 5.0 - 5.0;
        assert!((strategy.offer_price(&noon(10)) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_custom_margin() {
        let params = StrategyParams {
            margin: 0.0,
            ..StrategyParams::default()
        };
        let strategy = Strategy::with_params("TEST_NODE", daily_series(), Vec::new(), params);
        assert_eq!(strategy.offer_price(&noon(3)), 10.0);
    }

    #[test]
    fn test_apply_rules_gates_offer() {
        // Jan 10, 2024 is a Wednesday
        let rule = TimeBasedRule::new(Weekday::Wed, [12]).unwrap();
        let strategy = Strategy::new("TEST_NODE", daily_series(), vec![rule]);

        assert!(strategy.apply_rules(&noon(10)).is_finite());
        assert_eq!(strategy.apply_rules(&noon(9)), f64::NEG_INFINITY);
    }

    #[test]
    fn test_empty_rule_list_never_bids() {
        let strategy = Strategy::new("TEST_NODE", daily_series(), Vec::new());
        assert_eq!(strategy.apply_rules(&noon(10)), f64::NEG_INFINITY);
        assert_eq!(strategy.rules_label(), "no rules");
    }

    #[test]
    fn test_conjunctive_rules_on_disjoint_days_never_apply() {
        let rules = vec![
            TimeBasedRule::new(Weekday::Tue, 0..24).unwrap(),
            TimeBasedRule::new(Weekday::Wed, 0..24).unwrap(),
        ];
        let strategy = Strategy::new("TEST_NODE", daily_series(), rules);

        for day in 1..=10 {
            assert!(!strategy.rules_apply(&noon(day)));
        }
        assert_eq!(strategy.rules_label(), "Tue [0-23] & Wed [0-23]");
    }

    #[test]
    fn test_any_combinator_is_opt_in() {
        let rules = vec![
            TimeBasedRule::new(Weekday::Tue, [12]).unwrap(),
            TimeBasedRule::new(Weekday::Wed, [12]).unwrap(),
        ];
        let params = StrategyParams {
            combinator: RuleCombinator::Any,
            ..StrategyParams::default()
        };
        let strategy = Strategy::with_params("TEST_NODE", daily_series(), rules, params);

        assert!(strategy.rules_apply(&noon(9))); // Tuesday
        assert!(strategy.rules_apply(&noon(10))); // Wednesday
        assert!(!strategy.rules_apply(&noon(11)));
        assert_eq!(strategy.rules_label(), "Tue [12] | Wed [12]");
    }
}
