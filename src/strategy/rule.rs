//! Time-of-week bidding rules and the per-node rule table

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use crate::error::{BacktestError, BacktestResult};
use crate::season::{texas_season, TexasSeason};
use crate::types::{day_name, parse_weekday};

/// Bid only on one weekday, in a set of hours, optionally in one Texas season
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeBasedRule {
    pub day_of_week: Weekday,
    /// Qualifying hours of day (0-23)
    pub hours: BTreeSet<u32>,
    pub season: Option<TexasSeason>,
}

impl TimeBasedRule {
    pub fn new(day_of_week: Weekday, hours: impl IntoIterator<Item = u32>) -> BacktestResult<Self> {
        let hours: BTreeSet<u32> = hours.into_iter().collect();
        if let Some(bad) = hours.iter().find(|h| **h > 23) {
            return Err(BacktestError::InvalidRule(format!(
                "hour {} out of range 0-23 for {}",
                bad,
                day_name(day_of_week)
            )));
        }
        Ok(Self {
            day_of_week,
            hours,
            season: None,
        })
    }

    pub fn with_season(mut self, season: TexasSeason) -> Self {
        self.season = Some(season);
        self
    }

    /// Weekday matches, hour is listed, and the season (if any) matches
    pub fn is_applicable(&self, ts: &NaiveDateTime) -> bool {
        ts.weekday() == self.day_of_week
            && self.hours.contains(&ts.hour())
            && self.season.map_or(true, |season| texas_season(*ts) == season)
    }

    /// Hours collapsed into inclusive runs, e.g. [(4, 9), (19, 19)]
    pub fn hour_runs(&self) -> Vec<(u32, u32)> {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for &hour in &self.hours {
            match runs.last_mut() {
                Some((_, end)) if *end + 1 == hour => *end = hour,
                _ => runs.push((hour, hour)),
            }
        }
        runs
    }
}

impl fmt::Display for TimeBasedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let runs: Vec<String> = self
            .hour_runs()
            .into_iter()
            .map(|(start, end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{}-{}", start, end)
                }
            })
            .collect();

        write!(f, "{} [{}]", &day_name(self.day_of_week)[..3], runs.join(", "))?;
        if let Some(season) = self.season {
            write!(f, " @ {}", season)?;
        }
        Ok(())
    }
}

/// Serialized form of a rule in the node table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub day: String,
    pub hours: Vec<u32>,
    #[serde(default)]
    pub season: Option<TexasSeason>,
}

impl TryFrom<&RuleSpec> for TimeBasedRule {
    type Error = BacktestError;

    fn try_from(spec: &RuleSpec) -> BacktestResult<Self> {
        let day = parse_weekday(&spec.day)
            .ok_or_else(|| BacktestError::InvalidRule(format!("unknown weekday {:?}", spec.day)))?;
        let rule = TimeBasedRule::new(day, spec.hours.iter().copied())?;
        Ok(match spec.season {
            Some(season) => rule.with_season(season),
            None => rule,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRules {
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// Declarative node -> rules table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRuleTable {
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeRules>,
}

impl NodeRuleTable {
    pub fn load(path: impl AsRef<Path>) -> BacktestResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| BacktestError::io(path, e))?;
        Self::from_yaml_str(&raw)
    }

    /// Parse and validate every rule up front
    pub fn from_yaml_str(raw: &str) -> BacktestResult<Self> {
        let table: NodeRuleTable = serde_yaml::from_str(raw)?;
        for node in table.nodes.keys() {
            table.rules_for(node)?;
        }
        Ok(table)
    }

    /// Node names, sorted
    pub fn nodes(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn rules_for(&self, node: &str) -> BacktestResult<Vec<TimeBasedRule>> {
        let entry = self
            .nodes
            .get(node)
            .ok_or_else(|| BacktestError::UnknownNode(node.to_string()))?;
        entry
            .rules
            .iter()
            .map(|spec| {
                TimeBasedRule::try_from(spec).map_err(|e| match e {
                    BacktestError::InvalidRule(msg) => {
                        BacktestError::InvalidRule(format!("{}: {}", node, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_rule_applicability_truth_table() {
        // 2024-07-02 is a Tuesday in Summer
        let rule = TimeBasedRule::new(Weekday::Tue, [4, 5, 6, 21]).unwrap();

        assert!(rule.is_applicable(&at(2024, 7, 2, 5)));
        assert!(rule.is_applicable(&at(2024, 7, 2, 21)));
        assert!(!rule.is_applicable(&at(2024, 7, 2, 7)), "hour not listed");
        assert!(!rule.is_applicable(&at(2024, 7, 3, 5)), "wrong weekday");
    }

    #[test]
    fn test_rule_with_season() {
        let rule = TimeBasedRule::new(Weekday::Tue, [5])
            .unwrap()
            .with_season(TexasSeason::Summer);

        assert!(rule.is_applicable(&at(2024, 7, 2, 5)));
        // 2024-01-02 is a Tuesday in Early Winter
        assert!(!rule.is_applicable(&at(2024, 1, 2, 5)));
    }

    #[test]
    fn test_rule_label_compresses_runs() {
        let rule = TimeBasedRule::new(Weekday::Tue, (4..10).chain(19..24)).unwrap();
        assert_eq!(rule.to_string(), "Tue [4-9, 19-23]");

        let single = TimeBasedRule::new(Weekday::Sat, [6])
            .unwrap()
            .with_season(TexasSeason::Fall);
        assert_eq!(single.to_string(), "Sat [6] @ Fall");
    }

    #[test]
    fn test_out_of_range_hour_rejected() {
        assert!(matches!(
            TimeBasedRule::new(Weekday::Mon, [24]),
            Err(BacktestError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_node_rule_table_from_yaml() {
        let yaml = r#"
nodes:
  DC_L:
    rules:
      - day: Tuesday
        hours: [23]
      - day: Wednesday
        hours: [4, 5]
        season: Early Spring
"#;
        let table = NodeRuleTable::from_yaml_str(yaml).unwrap();
        assert_eq!(table.nodes(), vec!["DC_L".to_string()]);

        let rules = table.rules_for("DC_L").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].day_of_week, Weekday::Wed);
        assert_eq!(rules[1].season, Some(TexasSeason::EarlySpring));

        assert!(matches!(
            table.rules_for("LZ_NORTH"),
            Err(BacktestError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_node_rule_table_rejects_bad_weekday() {
        let yaml = "nodes:\n  X:\n    rules:\n      - day: Someday\n        hours: [1]\n";
        assert!(matches!(
            NodeRuleTable::from_yaml_str(yaml),
            Err(BacktestError::InvalidRule(_))
        ));
    }
}
