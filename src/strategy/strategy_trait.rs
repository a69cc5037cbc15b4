//! BidStrategy trait - the seam between the evaluator and bid pricing

use chrono::NaiveDateTime;

/// Anything that can price a virtual bid for an hour
pub trait BidStrategy {
    /// Settlement point the strategy bids on
    fn settlement_point(&self) -> &str;

    /// Bid price for `ts`: finite offer, NaN (no history) or -inf (no bid)
    fn apply_rules(&self, ts: &NaiveDateTime) -> f64;

    /// Label written into the `rules` column
    fn rules_label(&self) -> String;

    /// Number of history rows the strategy prices from
    fn history_len(&self) -> usize;
}

impl BidStrategy for crate::strategy::Strategy {
    fn settlement_point(&self) -> &str {
        self.settlement_point()
    }

    fn apply_rules(&self, ts: &NaiveDateTime) -> f64 {
        self.apply_rules(ts)
    }

    fn rules_label(&self) -> String {
        self.rules_label()
    }

    fn history_len(&self) -> usize {
        self.node_data().len()
    }
}
