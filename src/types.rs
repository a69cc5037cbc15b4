//! Core types used throughout the backtester
//!
//! Defines enriched price rows and the evaluation rows derived from them.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::season;

/// Weekdays in report order (Monday first)
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Full English weekday name ("Monday")
pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parse a weekday from its full or abbreviated English name
pub fn parse_weekday(s: &str) -> Option<Weekday> {
    s.trim().parse::<Weekday>().ok()
}

/// One hourly row of a node's price history, enriched with calendar fields
#[derive(Debug, Clone, PartialEq)]
pub struct PriceObservation {
    pub timestamp: NaiveDateTime,
    pub settlement_point: String,
    pub day_of_week: Weekday,
    /// Hour of day, 0-23
    pub hour: u32,
    /// Hour ending, 1-24
    pub hour_ending: u32,
    pub month_name: &'static str,
    /// Quarter-based season label
    pub season: &'static str,
    pub spp_da: f64,
    pub spp_rt: f64,
}

impl PriceObservation {
    pub fn new(settlement_point: &str, timestamp: NaiveDateTime, spp_da: f64, spp_rt: f64) -> Self {
        Self {
            timestamp,
            settlement_point: settlement_point.to_string(),
            day_of_week: timestamp.weekday(),
            hour: timestamp.hour(),
            hour_ending: timestamp.hour() + 1,
            month_name: season::month_name(timestamp),
            season: season::quarter_season(timestamp),
            spp_da,
            spp_rt,
        }
    }

    /// RT minus DA spread for this hour
    pub fn spread(&self) -> f64 {
        self.spp_rt - self.spp_da
    }
}

/// A price row after strategy evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRow {
    pub observation: PriceObservation,
    /// True offer price; NaN without history, -inf when no rule applies
    pub bid_price: f64,
    /// Display-only bid (DA +/- 1 after overwrite), never used for awards
    pub display_bid_price: f64,
    pub awarded: bool,
    pub profit: f64,
    pub rules: String,
    pub cum_profit: f64,
    pub cum_awarded: u64,
}

/// Flat CSV form of [`EvaluationRow`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub date: String,
    #[serde(rename = "settlementPoint")]
    pub settlement_point: String,
    pub day_of_week: String,
    pub hour: u32,
    pub hour_ending: u32,
    pub month_name: String,
    pub season: String,
    #[serde(rename = "SPP_DA")]
    pub spp_da: f64,
    #[serde(rename = "SPP_RT")]
    pub spp_rt: f64,
    pub bid_price: f64,
    pub display_bid_price: f64,
    /// 1 or 0
    pub awarded: u8,
    pub profit: f64,
    pub rules: String,
    pub cum_profit: f64,
    pub cum_awarded: u64,
}

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl From<&EvaluationRow> for EvaluationRecord {
    fn from(row: &EvaluationRow) -> Self {
        let obs = &row.observation;
        Self {
            date: obs.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            settlement_point: obs.settlement_point.clone(),
            day_of_week: day_name(obs.day_of_week).to_string(),
            hour: obs.hour,
            hour_ending: obs.hour_ending,
            month_name: obs.month_name.to_string(),
            season: obs.season.to_string(),
            spp_da: obs.spp_da,
            spp_rt: obs.spp_rt,
            bid_price: row.bid_price,
            display_bid_price: row.display_bid_price,
            awarded: u8::from(row.awarded),
            profit: row.profit,
            rules: row.rules.clone(),
            cum_profit: row.cum_profit,
            cum_awarded: row.cum_awarded,
        }
    }
}
