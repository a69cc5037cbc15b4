//! Backtesting Module
//!
//! Walks a node's price history hour by hour:
//! - Asks the strategy for a bid price
//! - Marks the bid awarded when it is at or above the DA price
//! - Books RT - DA as profit on awarded hours
//!
//! The display-only bid overwrite runs strictly after awards are fixed.

use tracing::{debug, warn};

use crate::strategy::BidStrategy;
use crate::types::{EvaluationRow, PriceObservation};

/// Backtest configuration
#[derive(Debug, Clone)]
pub struct BacktestConfig {
    /// Replace the displayed bid with DA +/- 1 after evaluation
    pub display_bid_overwrite: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            display_bid_overwrite: true,
        }
    }
}

/// A bid clears when it is at or above the DA price. NaN and -inf never do.
pub fn is_awarded(bid_price: f64, spp_da: f64) -> bool {
    bid_price >= spp_da && bid_price.is_finite()
}

/// RT - DA on awarded hours, exactly zero otherwise
pub fn hourly_profit(awarded: bool, spp_da: f64, spp_rt: f64) -> f64 {
    if awarded {
        spp_rt - spp_da
    } else {
        0.0
    }
}

/// Evaluate `strategy` on every row of `node_series`.
///
/// The series is usually a separate load of the same node the strategy was
/// built from; the two are not required to be the same object.
pub fn evaluate<S: BidStrategy + ?Sized>(
    node_series: &[PriceObservation],
    strategy: &S,
) -> Vec<EvaluationRow> {
    if node_series.len() != strategy.history_len() {
        warn!(
            node = strategy.settlement_point(),
            series_rows = node_series.len(),
            strategy_rows = strategy.history_len(),
            "Evaluated series differs from strategy history"
        );
    }

    let label = strategy.rules_label();
    let mut cum_profit = 0.0;
    let mut cum_awarded = 0u64;

    let rows: Vec<EvaluationRow> = node_series
        .iter()
        .map(|obs| {
            let bid_price = strategy.apply_rules(&obs.timestamp);
            let awarded = is_awarded(bid_price, obs.spp_da);
            let profit = hourly_profit(awarded, obs.spp_da, obs.spp_rt);

            // NaN profit (awarded hour with a missing RT price) is skipped
            if !profit.is_nan() {
                cum_profit += profit;
            }
            cum_awarded += u64::from(awarded);

            EvaluationRow {
                observation: obs.clone(),
                bid_price,
                display_bid_price: bid_price,
                awarded,
                profit,
                rules: label.clone(),
                cum_profit,
                cum_awarded,
            }
        })
        .collect();

    debug!(
        node = strategy.settlement_point(),
        rows = rows.len(),
        awarded = cum_awarded,
        "Evaluation complete"
    );
    rows
}

/// Overwrite the displayed bid with DA + 1 (awarded) or DA - 1 (not awarded).
/// Leaves `bid_price`, `awarded` and `profit` untouched.
pub fn apply_display_overwrite(rows: &mut [EvaluationRow]) {
    for row in rows.iter_mut() {
        let da = row.observation.spp_da;
        row.display_bid_price = if row.awarded { da + 1.0 } else { da - 1.0 };
    }
}

/// Evaluate and apply the configured display overwrite
pub fn run_backtest<S: BidStrategy + ?Sized>(
    node_series: &[PriceObservation],
    strategy: &S,
    config: &BacktestConfig,
) -> Vec<EvaluationRow> {
    let mut rows = evaluate(node_series, strategy);
    if config.display_bid_overwrite {
        apply_display_overwrite(&mut rows);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, Timelike};

    /// Bids a fixed price on even hours, NaN on hour 1, -inf otherwise
    struct FixedBid(f64);

    impl BidStrategy for FixedBid {
        fn settlement_point(&self) -> &str {
            "FIXED"
        }

        fn apply_rules(&self, ts: &NaiveDateTime) -> f64 {
            match ts.hour() {
                1 => f64::NAN,
                h if h % 2 == 0 => self.0,
                _ => f64::NEG_INFINITY,
            }
        }

        fn rules_label(&self) -> String {
            "fixed".to_string()
        }

        fn history_len(&self) -> usize {
            4
        }
    }

    fn hours(prices: &[(f64, f64)]) -> Vec<PriceObservation> {
        prices
            .iter()
            .enumerate()
            .map(|(h, (da, rt))| {
                let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
                    .unwrap()
                    .and_hms_opt(h as u32, 0, 0)
                    .unwrap();
                PriceObservation::new("FIXED", ts, *da, *rt)
            })
            .collect()
    }

    #[test]
    fn test_award_and_profit() {
        // h0 bid 30 >= DA 25 -> awarded; h1 NaN; h2 bid 30 < DA 35; h3 -inf
        let series = hours(&[(25.0, 40.0), (10.0, 50.0), (35.0, 20.0), (-5.0, 80.0)]);
        let rows = evaluate(&series, &FixedBid(30.0));

        let awarded: Vec<bool> = rows.iter().map(|r| r.awarded).collect();
        assert_eq!(awarded, vec![true, false, false, false]);
        assert_eq!(rows[0].profit, 15.0);
        assert!(rows[1].bid_price.is_nan());
        assert_eq!(rows[3].bid_price, f64::NEG_INFINITY);
        assert_eq!(rows[3].cum_profit, 15.0);
        assert_eq!(rows[3].cum_awarded, 1);
        assert!(rows.iter().all(|r| r.rules == "fixed"));
    }

    #[test]
    fn test_unawarded_rows_have_zero_profit() {
        let series = hours(&[(25.0, f64::NAN), (10.0, 50.0), (35.0, 20.0), (-5.0, 80.0)]);
        let rows = evaluate(&series, &FixedBid(20.0));

        for row in rows.iter().filter(|r| !r.awarded) {
            assert_eq!(row.profit, 0.0);
        }
    }

    #[test]
    fn test_missing_rt_price_does_not_poison_cumulative_profit() {
        // h0 awarded with no RT price, h2 awarded with RT 50
        let series = hours(&[(25.0, f64::NAN), (10.0, 50.0), (20.0, 50.0), (-5.0, 80.0)]);
        let rows = evaluate(&series, &FixedBid(30.0));

        assert!(rows[0].awarded);
        assert!(rows[0].profit.is_nan());
        assert_eq!(rows[0].cum_profit, 0.0);
        assert_eq!(rows[2].profit, 30.0);
        assert_eq!(rows[2].cum_profit, 30.0);
        assert_eq!(rows[3].cum_profit, 30.0);
        assert_eq!(rows[3].cum_awarded, 2);
    }

    #[test]
    fn test_bid_equal_to_da_is_awarded() {
        assert!(is_awarded(30.0, 30.0));
        assert!(!is_awarded(f64::NAN, 30.0));
        assert!(!is_awarded(f64::NEG_INFINITY, f64::NEG_INFINITY));
    }

    #[test]
    fn test_display_overwrite_after_award() {
        let series = hours(&[(25.0, 40.0), (10.0, 50.0), (35.0, 20.0), (-5.0, 80.0)]);
        let strategy = FixedBid(30.0);
        let plain = evaluate(&series, &strategy);
        let shown = run_backtest(&series, &strategy, &BacktestConfig::default());

        assert_eq!(shown[0].display_bid_price, 26.0);
        assert_eq!(shown[2].display_bid_price, 34.0);
        for (a, b) in plain.iter().zip(&shown) {
            assert_eq!(a.awarded, b.awarded);
            assert_eq!(a.profit, b.profit);
            assert_eq!(a.bid_price.to_bits(), b.bid_price.to_bits());
        }
    }

    #[test]
    fn test_overwrite_disabled_keeps_true_bid() {
        let series = hours(&[(25.0, 40.0)]);
        let config = BacktestConfig {
            display_bid_overwrite: false,
        };
        let rows = run_backtest(&series, &FixedBid(30.0), &config);
        assert_eq!(rows[0].display_bid_price, 30.0);
    }
}
