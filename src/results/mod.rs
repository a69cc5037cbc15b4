//! Results Reporter
//!
//! Aggregates evaluated rows into a performance summary, renders it as text
//! and draws the per-node chart. Degenerate ratios (no awarded hours) come
//! out as NaN or infinity instead of failing.

pub mod chart;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::types::EvaluationRow;

/// Backtest performance summary for one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub settlement_point: String,
    pub rules: String,
    pub rows: usize,
    /// Sum of hourly profit
    pub total_profit: f64,
    /// Sum of negative hourly profit
    pub total_losses: f64,
    pub hours_awarded: u64,
    /// Mean profit over every row, awarded or not
    #[serde(deserialize_with = "nan_if_null")]
    pub average_profit: f64,
    /// Total profit / DA cost of awarded hours
    #[serde(deserialize_with = "nan_if_null")]
    pub roi: f64,
    pub winning_hours: u64,
    pub losing_hours: u64,
    /// Winning share of awarded hours (0.0 to 1.0)
    pub win_rate: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Largest peak-to-trough fall of cumulative profit
    pub max_drawdown: f64,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
}

/// JSON has no NaN or infinity; serde_json writes them as null
fn nan_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl PerformanceSummary {
    pub fn from_rows(settlement_point: &str, rows: &[EvaluationRow]) -> Self {
        let profits = || rows.iter().map(|r| r.profit).filter(|p| !p.is_nan());
        let awarded = || rows.iter().filter(|r| r.awarded);

        let total_profit: f64 = profits().sum();
        let total_losses: f64 = profits().filter(|p| *p < 0.0).sum();
        let counted = profits().count();
        let average_profit = if counted > 0 {
            total_profit / counted as f64
        } else {
            f64::NAN
        };

        let hours_awarded = awarded().count() as u64;
        let awarded_cost: f64 = awarded()
            .map(|r| r.observation.spp_da)
            .filter(|p| !p.is_nan())
            .sum();
        // 0/0 -> NaN, x/0 -> +-inf
        let roi = total_profit / awarded_cost;

        let winning_hours = awarded().filter(|r| r.profit > 0.0).count() as u64;
        let losing_hours = awarded().filter(|r| r.profit < 0.0).count() as u64;
        let win_rate = if hours_awarded > 0 {
            winning_hours as f64 / hours_awarded as f64
        } else {
            0.0
        };

        let largest_win = profits().fold(0.0, f64::max);
        let largest_loss = profits().fold(0.0, f64::min);

        let mut peak = 0.0_f64;
        let mut max_drawdown = 0.0_f64;
        let mut running = 0.0;
        for profit in profits() {
            running += profit;
            peak = peak.max(running);
            max_drawdown = max_drawdown.max(peak - running);
        }

        Self {
            settlement_point: settlement_point.to_string(),
            rules: rows.first().map(|r| r.rules.clone()).unwrap_or_default(),
            rows: rows.len(),
            total_profit,
            total_losses,
            hours_awarded,
            average_profit,
            roi,
            winning_hours,
            losing_hours,
            win_rate,
            largest_win,
            largest_loss,
            max_drawdown,
            first_timestamp: rows.first().map(|r| r.observation.timestamp),
            last_timestamp: rows.last().map(|r| r.observation.timestamp),
        }
    }
}

/// Format a money amount with thousands separators: -1,234.56
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

impl fmt::Display for PerformanceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Results for node {}:", self.settlement_point)?;
        writeln!(f, "\tRules: {}", self.rules)?;
        writeln!(f, "\tTotal profit: USD {}", format_usd(self.total_profit))?;
        writeln!(f, "\tTotal losses: USD {}", format_usd(self.total_losses))?;
        writeln!(f, "\tTotal hours awarded: {}", self.hours_awarded)?;
        writeln!(f, "\tAverage return: USD {}", format_usd(self.average_profit))?;
        writeln!(f, "\tROI: {:.2}%", self.roi * 100.0)?;
        writeln!(f, "\tWin rate: {:.2}%", self.win_rate * 100.0)?;
        writeln!(f, "\tMax drawdown: USD {}", format_usd(self.max_drawdown))
    }
}

/// Evaluated rows of one node plus their summary
#[derive(Debug, Clone)]
pub struct Results {
    pub settlement_point: String,
    pub rows: Vec<EvaluationRow>,
    pub summary: PerformanceSummary,
}

impl Results {
    pub fn new(settlement_point: &str, rows: Vec<EvaluationRow>) -> Self {
        let summary = PerformanceSummary::from_rows(settlement_point, &rows);
        Self {
            settlement_point: settlement_point.to_string(),
            rows,
            summary,
        }
    }
}

impl fmt::Display for Results {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary)
    }
}

/// Quantile with linear interpolation over the finite values; NaN if none
pub fn quantile(values: impl IntoIterator<Item = f64>, q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let weight = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
