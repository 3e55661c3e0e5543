//! # Rule Engine
//!
//! [`RuleEngine`] is the orchestrator. For each processed receipt it loads
//! the owner's active rules, evaluates each rule's condition group against
//! the receipt, dispatches the actions of every matching rule, and advances
//! the rule's usage statistics.
//!
//! ## Failure Policy
//!
//! [`RuleEngine::process_record`] never fails. A receipt without an owner, a
//! rule store that cannot be reached, a malformed rule, or a failing usage
//! update all degrade to fewer (or zero) matches, logged with the rule and
//! record identifiers. Only [`RuleEngine::suggest`] propagates a storage
//! error, since suggestions are not on the receipt-processing path.
//!
//! ## Usage Statistics
//!
//! `usage_count` is advanced with [`RuleStore::increment_usage`], which the
//! store performs atomically. The engine never reads a count to write it back.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::action::ActionDispatcher;
use crate::error::EngineError;
use crate::record::Record;
use crate::rule::{Rule, RuleMatch};
use crate::store::{within, DiscardMutator, RecordMutator, RecordQuery, RuleStore};
use crate::suggestion::{suggest_from_records, RuleSuggestion};

/// Default per-call storage deadline.
pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on every individual storage call.
    pub storage_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }
}

/// The receipt rule engine. Cheap to clone; clones share collaborators.
#[derive(Clone)]
pub struct RuleEngine {
    rules: Arc<dyn RuleStore>,
    mutator: Arc<dyn RecordMutator>,
    records: Arc<dyn RecordQuery>,
    config: EngineConfig,
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RuleEngine {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        mutator: Arc<dyn RecordMutator>,
        records: Arc<dyn RecordQuery>,
        config: EngineConfig,
    ) -> Self {
        Self {
            rules,
            mutator,
            records,
            config,
        }
    }

    /// Build an engine whose collaborators are all the same store.
    pub fn from_store<S>(store: S, config: EngineConfig) -> Self
    where
        S: RuleStore + RecordMutator + RecordQuery + Clone + 'static,
    {
        Self::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store),
            config,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn dispatcher(&self) -> ActionDispatcher {
        ActionDispatcher::new(self.config.storage_timeout)
    }

    /// Run every active rule of the receipt's owner against the receipt.
    ///
    /// Conditions see the receipt as passed in. Actions are applied to a
    /// working copy that accumulates the writes of earlier matching rules.
    pub async fn process_record(&self, record: &Record) -> Vec<RuleMatch> {
        let Some(user_id) = record.user_id() else {
            tracing::debug!(record_id = record.id().unwrap_or_default(), "receipt has no owner, skipping rules");
            return Vec::new();
        };
        let record_id = record.id().unwrap_or_default();

        let rules = match within(
            self.config.storage_timeout,
            self.rules.find_active_rules(user_id),
        )
        .await
        {
            Ok(rules) => rules,
            Err(err) => {
                tracing::error!(user_id, record_id, error = %err, "failed to load rules");
                return Vec::new();
            }
        };

        let mut working = record.clone();
        let mut matches = Vec::new();

        for rule in &rules {
            if let Some(m) = self.apply_rule(rule, record, &mut working).await {
                matches.push(m);
            }
        }

        tracing::debug!(
            user_id,
            record_id,
            evaluated = rules.len(),
            matched = matches.len(),
            "processed receipt"
        );
        matches
    }

    async fn apply_rule(&self, rule: &Rule, record: &Record, working: &mut Record) -> Option<RuleMatch> {
        let outcome = rule.conditions.assess(record);
        tracing::debug!(
            rule_id = %rule.id,
            record_id = record.id().unwrap_or_default(),
            matched = outcome.matched,
            confidence = outcome.confidence,
            "evaluated rule"
        );
        if !outcome.matched {
            return None;
        }

        let actions_applied = self
            .dispatcher()
            .apply(&rule.actions, working, self.mutator.as_ref())
            .await;

        if let Err(err) = within(self.config.storage_timeout, self.rules.increment_usage(rule.id)).await {
            tracing::error!(rule_id = %rule.id, error = %err, "failed to record rule usage");
            return None;
        }

        tracing::info!(
            rule_id = %rule.id,
            rule_name = %rule.name,
            record_id = record.id().unwrap_or_default(),
            confidence = outcome.confidence,
            actions = actions_applied.len(),
            "rule matched"
        );

        Some(RuleMatch {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            confidence: outcome.confidence,
            actions_applied,
        })
    }

    /// Dry-run one rule against one receipt.
    ///
    /// Ignores `is_active` and ownership. Action descriptions are rendered
    /// against a scratch copy; nothing is written and usage statistics are
    /// untouched.
    pub async fn test_rule(&self, rule: &Rule, record: &Record) -> Option<RuleMatch> {
        let outcome = rule.conditions.assess(record);
        if !outcome.matched {
            return None;
        }

        let mut scratch = record.clone();
        let actions_applied = self
            .dispatcher()
            .apply(&rule.actions, &mut scratch, &DiscardMutator)
            .await;

        Some(RuleMatch {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            confidence: outcome.confidence,
            actions_applied,
        })
    }

    /// Propose new rules from the user's receipt history.
    pub async fn suggest(&self, user_id: &str) -> Result<Vec<RuleSuggestion>, EngineError> {
        let records = within(
            self.config.storage_timeout,
            self.records.find_records_by_user(user_id),
        )
        .await?;
        let suggestions = suggest_from_records(&records);
        tracing::debug!(user_id, records = records.len(), suggestions = suggestions.len(), "generated rule suggestions");
        Ok(suggestions)
    }
}
