//! # Actions
//!
//! A rule's actions are stored as a map from action name to a JSON config:
//!
//! ```json
//! {"set_category": {"category": "meals"}, "add_tags": {"tags": ["coffee"]}}
//! ```
//!
//! Recognized names parse into the closed [`Action`] enum. Unrecognized
//! names are skipped silently so newer rule definitions keep loading. A
//! recognized name whose config is missing its required field is malformed:
//! it is logged and skipped, and never reported as applied.
//!
//! The [`ActionDispatcher`] turns each action into one or more field updates
//! sent to a [`RecordMutator`]. A failing update is logged and the remaining
//! actions still run.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use crate::error::ActionError;
use crate::record::Record;
use crate::store::{within, RecordMutator};

/// Action name to action config, as stored on a rule.
pub type ActionMap = BTreeMap<String, Value>;

const DEFAULT_REVIEW_REASON: &str = "Triggered by AI rule";

/// A recognized, well-formed rule action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetCategory { category: String },
    AddTags { tags: Vec<String> },
    /// `template` may reference `{vendor_name}`, `{amount}`, `{date}`, `{category}`.
    SetDescription { template: String },
    FlagForReview { reason: String },
    AutoSync,
    SetAccountCode { account_code: String },
    ApplyTaxRule { tax_rule: String },
}

/// One field write produced by an action.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub path: &'static str,
    pub value: Value,
}

impl FieldUpdate {
    fn new(path: &'static str, value: impl Into<Value>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }
}

/// A required non-empty text value. Numbers are accepted and rendered, since
/// account codes are often written as bare numbers.
fn required_text(name: &str, config: &Value, key: &str) -> Result<String, ActionError> {
    match config.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(_) => Err(ActionError::new(name, format!("`{key}` must be a non-empty string"))),
        None => Err(ActionError::new(name, format!("missing `{key}`"))),
    }
}

impl Action {
    /// Parse one action map entry.
    ///
    /// Returns `Ok(None)` for names this engine does not know and
    /// `Err` for a known name with an unusable config.
    pub fn parse(name: &str, config: &Value) -> Result<Option<Self>, ActionError> {
        let action = match name {
            "set_category" => Self::SetCategory {
                category: required_text(name, config, "category")?,
            },
            "add_tags" => {
                let tags = config
                    .get("tags")
                    .and_then(Value::as_array)
                    .ok_or_else(|| ActionError::new(name, "`tags` must be a list"))?;
                let tags: Vec<String> = tags
                    .iter()
                    .map(|t| {
                        t.as_str()
                            .map(String::from)
                            .ok_or_else(|| ActionError::new(name, "`tags` entries must be strings"))
                    })
                    .collect::<Result<_, _>>()?;
                if tags.is_empty() {
                    return Err(ActionError::new(name, "`tags` is empty"));
                }
                Self::AddTags { tags }
            }
            "set_description" => Self::SetDescription {
                template: required_text(name, config, "description")?,
            },
            "flag_for_review" => Self::FlagForReview {
                reason: config
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_REVIEW_REASON)
                    .to_string(),
            },
            "auto_sync" => Self::AutoSync,
            "set_account_code" => Self::SetAccountCode {
                account_code: required_text(name, config, "account_code")?,
            },
            "apply_tax_rule" => Self::ApplyTaxRule {
                tax_rule: required_text(name, config, "tax_rule")?,
            },
            _ => return Ok(None),
        };
        Ok(Some(action))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetCategory { .. } => "set_category",
            Self::AddTags { .. } => "add_tags",
            Self::SetDescription { .. } => "set_description",
            Self::FlagForReview { .. } => "flag_for_review",
            Self::AutoSync => "auto_sync",
            Self::SetAccountCode { .. } => "set_account_code",
            Self::ApplyTaxRule { .. } => "apply_tax_rule",
        }
    }

    /// The field writes this action performs against `record`, plus the
    /// description reported once they succeed.
    pub fn plan(&self, record: &Record) -> (Vec<FieldUpdate>, String) {
        match self {
            Self::SetCategory { category } => (
                vec![FieldUpdate::new("category", category.as_str())],
                format!("Set category to {category}"),
            ),
            Self::AddTags { tags } => {
                let mut merged = record.tags();
                for tag in tags {
                    if !merged.contains(tag) {
                        merged.push(tag.clone());
                    }
                }
                (
                    vec![FieldUpdate::new("tags", merged)],
                    format!("Added tags: {}", tags.join(", ")),
                )
            }
            Self::SetDescription { template } => {
                let rendered = render_description(template, record);
                let description = format!("Set description to {rendered}");
                (vec![FieldUpdate::new("notes", rendered)], description)
            }
            Self::FlagForReview { reason } => (
                vec![
                    FieldUpdate::new("manual_review_needed", true),
                    FieldUpdate::new("review_reason", reason.as_str()),
                ],
                "Flagged for manual review".to_string(),
            ),
            Self::AutoSync => (
                vec![FieldUpdate::new("auto_sync", true)],
                "Enabled auto-sync".to_string(),
            ),
            Self::SetAccountCode { account_code } => (
                vec![FieldUpdate::new("account_code", account_code.as_str())],
                format!("Set account code to {account_code}"),
            ),
            Self::ApplyTaxRule { tax_rule } => (
                vec![FieldUpdate::new("tax_rule", tax_rule.as_str())],
                format!("Applied tax rule: {tax_rule}"),
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Description templates
// ---------------------------------------------------------------------------

fn placeholder(name: &str, record: &Record) -> Option<String> {
    let value = match name {
        "vendor_name" => record.extracted("vendor_name"),
        "amount" => record.extracted("total_amount"),
        "date" => record.extracted("date"),
        "category" => record.get("category"),
        _ => return None,
    };
    Some(match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    })
}

/// Substitute `{vendor_name}`, `{amount}`, `{date}` and `{category}`.
///
/// Missing values render as empty strings. Any other `{...}` token, and an
/// unmatched `{`, is copied through verbatim.
pub fn render_description(template: &str, record: &Record) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match placeholder(name, record) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Executes an [`ActionMap`] against a record through a [`RecordMutator`].
#[derive(Debug, Clone, Copy)]
pub struct ActionDispatcher {
    deadline: Duration,
}

impl ActionDispatcher {
    /// `deadline` bounds each individual mutator call.
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Apply every recognized action in `actions`.
    ///
    /// Successful writes are mirrored into `record`, so later actions (and
    /// later rules sharing the working copy) observe them. Returns the
    /// descriptions of the actions whose writes all succeeded.
    pub async fn apply(
        &self,
        actions: &ActionMap,
        record: &mut Record,
        mutator: &dyn RecordMutator,
    ) -> Vec<String> {
        let record_id = record.id().unwrap_or_default().to_string();
        let mut applied = Vec::new();

        for (name, config) in actions {
            let action = match Action::parse(name, config) {
                Ok(Some(action)) => action,
                Ok(None) => {
                    tracing::debug!(action = %name, "skipping unrecognized action");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(action = %name, record_id = %record_id, error = %err, "skipping malformed action");
                    continue;
                }
            };

            let (updates, description) = action.plan(record);
            let mut complete = true;
            for update in updates {
                let write = within(
                    self.deadline,
                    mutator.apply_field_update(&record_id, update.path, update.value.clone()),
                )
                .await;
                match write {
                    Ok(()) => {
                        record.set(update.path, update.value);
                    }
                    Err(err) => {
                        tracing::error!(
                            action = action.name(),
                            record_id = %record_id,
                            field = update.path,
                            error = %err,
                            "action failed"
                        );
                        complete = false;
                        break;
                    }
                }
            }

            if complete {
                applied.push(description);
            }
        }

        applied
    }
}
