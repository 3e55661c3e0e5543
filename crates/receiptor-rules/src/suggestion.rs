//! # Rule Suggestions
//!
//! An advisory pass over a user's receipt history that proposes rules the
//! user has not written yet:
//!
//! - **Vendor categorization**: a vendor seen on at least three receipts
//!   gets a "vendor name contains X" rule setting the category most often
//!   assigned to that vendor's receipts. Vendors whose receipts were never
//!   categorized get no suggestion.
//! - **High-amount review**: if any receipt totals more than 1000, one rule
//!   flagging such receipts for manual review is proposed.
//!
//! Nothing here mutates state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::action::ActionMap;
use crate::condition::{Condition, NumberOperator, TextOperator};
use crate::group::{ConditionGroup, Logic};
use crate::record::Record;

/// Receipts from one vendor needed before a categorization rule is proposed.
pub const MIN_VENDOR_RECEIPTS: usize = 3;

/// Totals above this are proposed for manual review.
pub const HIGH_AMOUNT_THRESHOLD: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    VendorCategorization,
    HighAmountReview,
}

/// A proposed rule definition, ready to be turned into a [`Rule`](crate::rule::Rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSuggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub title: String,
    pub description: String,
    pub conditions: ConditionGroup,
    pub actions: ActionMap,
}

#[derive(Default)]
struct VendorStats {
    receipts: usize,
    /// Category counts in first-seen order.
    categories: Vec<(String, usize)>,
}

impl VendorStats {
    fn observe(&mut self, category: Option<&str>) {
        self.receipts += 1;
        let Some(category) = category.filter(|c| !c.is_empty()) else {
            return;
        };
        match self.categories.iter_mut().find(|(c, _)| c == category) {
            Some((_, n)) => *n += 1,
            None => self.categories.push((category.to_string(), 1)),
        }
    }

    /// Most frequent category; ties go to the first seen.
    fn dominant_category(&self) -> Option<&str> {
        let mut best: Option<&(String, usize)> = None;
        for entry in &self.categories {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(c, _)| c.as_str())
    }
}

fn total_amount(record: &Record) -> Option<f64> {
    match record.extracted("total_amount")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn actions(value: Value) -> ActionMap {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => ActionMap::new(),
    }
}

fn vendor_suggestion(vendor: &str, category: &str) -> RuleSuggestion {
    RuleSuggestion {
        kind: SuggestionKind::VendorCategorization,
        title: format!("Auto-categorize {vendor} receipts"),
        description: format!("Automatically categorize receipts from {vendor} as {category}"),
        conditions: ConditionGroup::new(
            Logic::And,
            vec![Condition::text(
                "extracted_data.vendor_name",
                TextOperator::Contains,
                vendor,
            )],
        ),
        actions: actions(json!({
            "set_category": {"category": category},
            "add_tags": {"tags": ["auto-categorized"]}
        })),
    }
}

fn high_amount_suggestion() -> RuleSuggestion {
    RuleSuggestion {
        kind: SuggestionKind::HighAmountReview,
        title: "Flag high-amount receipts for review".to_string(),
        description: "Automatically flag receipts over $1000 for manual review".to_string(),
        conditions: ConditionGroup::new(
            Logic::And,
            vec![Condition::number(
                "extracted_data.total_amount",
                NumberOperator::GreaterThan,
                HIGH_AMOUNT_THRESHOLD,
            )],
        ),
        actions: actions(json!({
            "flag_for_review": {"reason": "High amount - requires review"},
            "add_tags": {"tags": ["high-amount", "review-required"]}
        })),
    }
}

/// Derive suggestions from a receipt history.
///
/// Vendor suggestions come first, in the order vendors first appear in
/// `records`, followed by at most one high-amount suggestion.
pub fn suggest_from_records(records: &[Record]) -> Vec<RuleSuggestion> {
    let mut order: Vec<&str> = Vec::new();
    let mut stats: HashMap<&str, VendorStats> = HashMap::new();
    let mut high_amount = false;

    for record in records {
        if let Some(vendor) = record
            .extracted("vendor_name")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
        {
            stats
                .entry(vendor)
                .or_insert_with(|| {
                    order.push(vendor);
                    VendorStats::default()
                })
                .observe(record.category());
        }
        if total_amount(record).is_some_and(|a| a > HIGH_AMOUNT_THRESHOLD) {
            high_amount = true;
        }
    }

    let mut suggestions: Vec<RuleSuggestion> = order
        .into_iter()
        .filter_map(|vendor| {
            let s = stats.get(vendor)?;
            if s.receipts < MIN_VENDOR_RECEIPTS {
                return None;
            }
            s.dominant_category()
                .map(|category| vendor_suggestion(vendor, category))
        })
        .collect();

    if high_amount {
        suggestions.push(high_amount_suggestion());
    }
    suggestions
}
