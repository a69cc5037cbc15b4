//! Season classification
//!
//! Two independent mappings live here:
//! - [`texas_season`]: eight-bucket Texas climate season, used by rules
//! - [`quarter_season`]: calendar quarter season, stored on loaded rows
//!
//! They are never reconciled with each other.

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Texas-specific season label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TexasSeason {
    #[serde(rename = "Early Winter")]
    EarlyWinter,
    Winter,
    #[serde(rename = "Early Spring")]
    EarlySpring,
    #[serde(rename = "Late Spring")]
    LateSpring,
    Summer,
    #[serde(rename = "Late Summer")]
    LateSummer,
    Fall,
    Unknown,
}

impl TexasSeason {
    pub fn label(&self) -> &'static str {
        match self {
            TexasSeason::EarlyWinter => "Early Winter",
            TexasSeason::Winter => "Winter",
            TexasSeason::EarlySpring => "Early Spring",
            TexasSeason::LateSpring => "Late Spring",
            TexasSeason::Summer => "Summer",
            TexasSeason::LateSummer => "Late Summer",
            TexasSeason::Fall => "Fall",
            TexasSeason::Unknown => "Unknown",
        }
    }

    /// Parse a label, case-insensitive
    pub fn from_label(s: &str) -> Option<Self> {
        let wanted = s.trim();
        [
            TexasSeason::EarlyWinter,
            TexasSeason::Winter,
            TexasSeason::EarlySpring,
            TexasSeason::LateSpring,
            TexasSeason::Summer,
            TexasSeason::LateSummer,
            TexasSeason::Fall,
            TexasSeason::Unknown,
        ]
        .into_iter()
        .find(|season| season.label().eq_ignore_ascii_case(wanted))
    }
}

impl fmt::Display for TexasSeason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Month buckets in match order. November sits in both the first and the
/// last bucket; the first one wins, so November is Early Winter.
const TEXAS_BUCKETS: [(&[u32], TexasSeason); 7] = [
    (&[11, 12, 1], TexasSeason::EarlyWinter),
    (&[2], TexasSeason::Winter),
    (&[3, 4], TexasSeason::EarlySpring),
    (&[5], TexasSeason::LateSpring),
    (&[6, 7, 8], TexasSeason::Summer),
    (&[9], TexasSeason::LateSummer),
    (&[10, 11], TexasSeason::Fall),
];

/// Texas season for a month number (1-12)
pub fn texas_season_for_month(month: u32) -> TexasSeason {
    TEXAS_BUCKETS
        .iter()
        .find(|(months, _)| months.contains(&month))
        .map(|(_, season)| *season)
        .unwrap_or(TexasSeason::Unknown)
}

/// Texas season for a date
pub fn texas_season(date: impl Datelike) -> TexasSeason {
    texas_season_for_month(date.month())
}

/// Texas season for today's local date
pub fn texas_season_today() -> TexasSeason {
    texas_season(Local::now().date_naive())
}

/// Calendar quarter (1-4) of a date
pub fn quarter(date: impl Datelike) -> u32 {
    (date.month0() / 3) + 1
}

/// Quarter-based season: Q1 Winter, Q2 Spring, Q3 Summer, Q4 Fall
pub fn quarter_season(date: impl Datelike) -> &'static str {
    match quarter(date) {
        1 => "Winter",
        2 => "Spring",
        3 => "Summer",
        _ => "Fall",
    }
}

/// English month name
pub fn month_name(date: impl Datelike) -> &'static str {
    const MONTHS: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    MONTHS[date.month0() as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_texas_season_examples() {
        assert_eq!(texas_season(date(2024, 1, 15)), TexasSeason::EarlyWinter);
        assert_eq!(texas_season(date(2024, 2, 15)), TexasSeason::Winter);
        assert_eq!(texas_season(date(2024, 3, 20)), TexasSeason::EarlySpring);
        assert_eq!(texas_season(date(2024, 4, 15)), TexasSeason::EarlySpring);
        assert_eq!(texas_season(date(2024, 5, 15)), TexasSeason::LateSpring);
        assert_eq!(texas_season(date(2024, 7, 4)), TexasSeason::Summer);
        assert_eq!(texas_season(date(2024, 9, 1)), TexasSeason::LateSummer);
        assert_eq!(texas_season(date(2024, 10, 31)), TexasSeason::Fall);
    }

    #[test]
    fn test_november_resolves_to_first_bucket() {
        assert_eq!(texas_season(date(2024, 11, 15)), TexasSeason::EarlyWinter);
        assert_eq!(texas_season(date(2023, 11, 1)), TexasSeason::EarlyWinter);
    }

    #[test]
    fn test_every_month_has_a_season() {
        for month in 1..=12 {
            assert_ne!(texas_season_for_month(month), TexasSeason::Unknown);
        }
        assert_eq!(texas_season_for_month(13), TexasSeason::Unknown);
        assert_eq!(texas_season_for_month(0), TexasSeason::Unknown);
    }

    #[test]
    fn test_texas_season_today_is_known() {
        assert_ne!(texas_season_today(), TexasSeason::Unknown);
    }

    #[test]
    fn test_quarter_season_differs_from_texas() {
        // October: Q4 "Fall" in both, November: Q4 "Fall" vs Texas "Early Winter"
        assert_eq!(quarter_season(date(2024, 10, 1)), "Fall");
        assert_eq!(quarter_season(date(2024, 11, 15)), "Fall");
        assert_eq!(quarter_season(date(2024, 3, 31)), "Winter");
        assert_eq!(quarter_season(date(2024, 4, 1)), "Spring");
        assert_eq!(quarter_season(date(2024, 9, 30)), "Summer");
        assert_eq!(quarter(date(2024, 12, 31)), 4);
    }

    #[test]
    fn test_labels_round_trip() {
        assert_eq!(
            TexasSeason::from_label("early winter"),
            Some(TexasSeason::EarlyWinter)
        );
        assert_eq!(TexasSeason::from_label("Late Summer"), Some(TexasSeason::LateSummer));
        assert_eq!(TexasSeason::from_label("Monsoon"), None);
        assert_eq!(month_name(date(2024, 2, 1)), "February");
    }

    #[test]
    fn test_season_serde_uses_labels() {
        let yaml = serde_yaml::to_string(&TexasSeason::EarlySpring).unwrap();
        assert_eq!(yaml.trim(), "Early Spring");
        let parsed: TexasSeason = serde_yaml::from_str("Late Spring").unwrap();
        assert_eq!(parsed, TexasSeason::LateSpring);
    }
}
