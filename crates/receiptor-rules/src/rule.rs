//! # Rules and Match Results
//!
//! A [`Rule`] pairs a [`ConditionGroup`] with an [`ActionMap`]. The usage
//! statistics (`usage_count`, `last_used`) are owned by the rule store and
//! only ever advanced by [`RuleStore::increment_usage`](crate::store::RuleStore::increment_usage);
//! [`RuleUpdate`] deliberately has no way to touch them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::ActionMap;
use crate::group::ConditionGroup;

fn default_true() -> bool {
    true
}

/// A user-defined automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub conditions: ConditionGroup,
    #[serde(default)]
    pub actions: ActionMap,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// A new active rule with fresh id, zero usage and current timestamps.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        conditions: ConditionGroup,
        actions: ActionMap,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            description: String::new(),
            conditions,
            actions,
            is_active: true,
            usage_count: 0,
            last_used: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Apply an edit, refreshing `updated_at`. Usage statistics are kept.
    pub fn apply_update(&mut self, update: RuleUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(conditions) = update.conditions {
            self.conditions = conditions;
        }
        if let Some(actions) = update.actions {
            self.actions = actions;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        self.updated_at = Utc::now();
    }
}

/// The user-editable subset of a rule. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub conditions: Option<ConditionGroup>,
    #[serde(default)]
    pub actions: Option<ActionMap>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// One rule that matched one record during an evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    pub rule_id: Uuid,
    pub rule_name: String,
    /// Fraction of the rule's conditions that held.
    pub confidence: f64,
    /// Human-readable descriptions of the actions that were applied.
    pub actions_applied: Vec<String>,
}

/// A persisted [`RuleMatch`], attached to the receipt it was produced for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleApplication {
    pub id: Uuid,
    pub receipt_id: String,
    pub rule_id: Uuid,
    pub rule_name: String,
    pub confidence: f64,
    pub actions_applied: Vec<String>,
    pub applied_at: DateTime<Utc>,
}

impl RuleApplication {
    pub fn from_match(receipt_id: impl Into<String>, m: &RuleMatch) -> Self {
        Self {
            id: Uuid::new_v4(),
            receipt_id: receipt_id.into(),
            rule_id: m.rule_id,
            rule_name: m.rule_name.clone(),
            confidence: m.confidence,
            actions_applied: m.actions_applied.clone(),
            applied_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Logic;
    use serde_json::json;

    #[test]
    fn deserialize_fills_defaults() {
        let rule: Rule = serde_json::from_value(json!({
            "name": "Coffee",
            "conditions": {"conditions": []}
        }))
        .unwrap();
        assert!(rule.is_active);
        assert_eq!(rule.usage_count, 0);
        assert!(rule.last_used.is_none());
        assert_eq!(rule.conditions.logic, Logic::And);
        assert!(rule.actions.is_empty());
    }

    #[test]
    fn update_preserves_usage_statistics() {
        let mut rule = Rule::new("u-1", "Coffee", ConditionGroup::default(), ActionMap::new());
        rule.usage_count = 7;
        let last_used = Some(Utc::now());
        rule.last_used = last_used;
        let before = rule.updated_at;

        rule.apply_update(RuleUpdate {
            name: Some("Cafe".into()),
            is_active: Some(false),
            ..RuleUpdate::default()
        });

        assert_eq!(rule.name, "Cafe");
        assert!(!rule.is_active);
        assert_eq!(rule.usage_count, 7);
        assert_eq!(rule.last_used, last_used);
        assert!(rule.updated_at >= before);
    }

    #[test]
    fn update_ignores_statistics_keys_on_the_wire() {
        let update: RuleUpdate =
            serde_json::from_value(json!({"name": "x", "usage_count": 99})).unwrap();
        assert_eq!(update.name.as_deref(), Some("x"));
    }

    #[test]
    fn application_copies_match() {
        let m = RuleMatch {
            rule_id: Uuid::new_v4(),
            rule_name: "Coffee".into(),
            confidence: 1.0,
            actions_applied: vec!["Set category to meals".into()],
        };
        let app = RuleApplication::from_match("r-1", &m);
        assert_eq!(app.receipt_id, "r-1");
        assert_eq!(app.rule_id, m.rule_id);
        assert_eq!(app.actions_applied, m.actions_applied);
    }
}
