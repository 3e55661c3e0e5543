//! # Condition Groups
//!
//! A rule's conditions are combined under one [`Logic`] operator:
//!
//! | Logic | Matches when                 |
//! |-------|------------------------------|
//! | `AND` | every condition holds        |
//! | `OR`  | at least one condition holds |
//! | `NOT` | no condition holds           |
//!
//! An empty group never matches. An unrecognized logic string never matches.
//!
//! Independently of the match decision, the group reports a confidence
//! score: the fraction of its conditions that individually held. Note that
//! a matching `NOT` group therefore has confidence `0.0`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::condition::Condition;
use crate::record::Record;

/// How a group combines its conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Logic {
    #[default]
    And,
    Or,
    Not,
    /// A logic string this engine does not recognize. Never matches.
    Unsupported(String),
}

impl Logic {
    /// Parse a logic string. Matching is exact (`"AND"`, `"OR"`, `"NOT"`).
    pub fn parse(s: &str) -> Self {
        match s {
            "AND" => Self::And,
            "OR" => Self::Or,
            "NOT" => Self::Not,
            other => Self::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Unsupported(s) => s,
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Logic {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Logic {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// Match decision and confidence for one group against one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupOutcome {
    pub matched: bool,
    /// Fraction of conditions that held, in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// A logic operator plus the conditions it combines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub logic: Logic,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl ConditionGroup {
    pub fn new(logic: Logic, conditions: Vec<Condition>) -> Self {
        Self { logic, conditions }
    }

    /// Evaluate every condition once and derive both the decision and the
    /// confidence from the same results.
    pub fn assess(&self, record: &Record) -> GroupOutcome {
        if self.conditions.is_empty() {
            return GroupOutcome {
                matched: false,
                confidence: 0.0,
            };
        }

        let results: Vec<bool> = self.conditions.iter().map(|c| c.evaluate(record)).collect();
        let held = results.iter().filter(|r| **r).count();

        let matched = match self.logic {
            Logic::And => held == results.len(),
            Logic::Or => held > 0,
            Logic::Not => held == 0,
            Logic::Unsupported(_) => false,
        };

        GroupOutcome {
            matched,
            confidence: held as f64 / results.len() as f64,
        }
    }

    /// Whether the group matches the record.
    pub fn evaluate(&self, record: &Record) -> bool {
        self.assess(record).matched
    }

    /// Fraction of conditions that hold for the record; `0.0` when empty.
    pub fn confidence(&self, record: &Record) -> f64 {
        self.assess(record).confidence
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::condition::NumberOperator;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        /// Confidence stays within [0, 1] and AND-match implies confidence 1.
        #[test]
        fn confidence_bounds(amount in -1e6f64..1e6, thresholds in prop::collection::vec(-1e6f64..1e6, 1..8)) {
            let record = Record::from_value(json!({"extracted_data": {"total_amount": amount}})).unwrap();
            let conditions: Vec<Condition> = thresholds
                .iter()
                .map(|t| Condition::number("extracted_data.total_amount", NumberOperator::GreaterThan, *t))
                .collect();

            let and = ConditionGroup::new(Logic::And, conditions.clone()).assess(&record);
            prop_assert!((0.0..=1.0).contains(&and.confidence));
            if and.matched {
                prop_assert_eq!(and.confidence, 1.0);
            }

            let not = ConditionGroup::new(Logic::Not, conditions.clone()).assess(&record);
            let or = ConditionGroup::new(Logic::Or, conditions).assess(&record);
            prop_assert_eq!(not.matched, !or.matched);
        }
    }
}
